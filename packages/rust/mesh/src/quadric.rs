//! Quadric error metric.
//!
//! A quadric accumulates squared distances to a set of planes as the 4x4
//! symmetric matrix `Σ p pᵀ` with `p = [a, b, c, d]` for the plane
//! `ax + by + cz + d = 0`.

use std::ops::{Add, AddAssign, Mul};

use nalgebra::{Matrix3, Matrix4, Point3, Vector3, Vector4};

/// Sum of plane quadrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric(Matrix4<f64>);

impl Default for Quadric {
    fn default() -> Self {
        Self(Matrix4::zeros())
    }
}

impl Quadric {
    /// Quadric of the plane through `point` with unit `normal`.
    pub fn from_plane(normal: Vector3<f64>, point: &Point3<f64>) -> Self {
        let d = -normal.dot(&point.coords);
        let p = Vector4::new(normal.x, normal.y, normal.z, d);
        Self(p * p.transpose())
    }

    /// Squared distance sum at `point`.
    pub fn error(&self, point: &Point3<f64>) -> f64 {
        let v = point.to_homogeneous();
        (v.transpose() * self.0 * v)[(0, 0)].max(0.0)
    }

    /// Point minimising the error, or `None` when the system is singular
    /// (flat or linear neighbourhoods).
    pub fn minimizer(&self) -> Option<Point3<f64>> {
        let a: Matrix3<f64> = self.0.fixed_view::<3, 3>(0, 0).into_owned();
        let b = Vector3::new(self.0[(0, 3)], self.0[(1, 3)], self.0[(2, 3)]);

        let scale = a.amax();
        if scale <= f64::EPSILON || a.determinant().abs() <= 1e-9 * scale.powi(3) {
            return None;
        }

        let x = a.try_inverse()? * -b;
        x.iter().all(|c| c.is_finite()).then(|| Point3::from(x))
    }
}

impl Add for Quadric {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Mul<f64> for Quadric {
    type Output = Self;

    fn mul(self, weight: f64) -> Self {
        Self(self.0 * weight)
    }
}
