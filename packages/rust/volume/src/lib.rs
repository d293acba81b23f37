//! Scalar density grids and the MRC/CCP4 map codec.
//!
//! A [`Volume`] stores samples x-fastest on a regular lattice with per-axis
//! spacing and a world-space origin. [`read_mrc`] produces one from a map
//! file; [`write_mrc`] writes one back as a float32 map.

pub mod mrc;

pub use mrc::{decode_mrc, encode_mrc, read_mrc, write_mrc};

use meshmaker_shared::{MeshmakerError, Result};
use nalgebra::Point3;

/// Regular 3-D grid of `f32` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    dims: [usize; 3],
    spacing: [f64; 3],
    origin: [f64; 3],
    values: Vec<f32>,
}

impl Volume {
    /// Wrap `values` (x-fastest) as a grid of `dims` samples.
    ///
    /// Every dimension must be non-zero and `values` must hold exactly
    /// `dims[0] * dims[1] * dims[2]` samples.
    pub fn new(
        dims: [usize; 3],
        spacing: [f64; 3],
        origin: [f64; 3],
        values: Vec<f32>,
    ) -> Result<Self> {
        if dims.contains(&0) {
            return Err(MeshmakerError::decode(format!(
                "grid dimensions must be positive, got {dims:?}"
            )));
        }

        let expected = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| MeshmakerError::decode(format!("grid {dims:?} is too large")))?;
        if values.len() != expected {
            return Err(MeshmakerError::decode(format!(
                "grid {dims:?} needs {expected} samples, got {}",
                values.len()
            )));
        }

        Ok(Self {
            dims,
            spacing,
            origin,
            values,
        })
    }

    /// Sample `f(x, y, z)` at every lattice index.
    pub fn from_fn(
        dims: [usize; 3],
        spacing: [f64; 3],
        origin: [f64; 3],
        mut f: impl FnMut(usize, usize, usize) -> f32,
    ) -> Result<Self> {
        let mut values = Vec::with_capacity(dims.iter().product());
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    values.push(f(x, y, z));
                }
            }
        }
        Self::new(dims, spacing, origin, values)
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// Raw samples, x-fastest.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sample at lattice index `(x, y, z)`. Panics when out of bounds.
    #[inline]
    pub fn value(&self, x: usize, y: usize, z: usize) -> f32 {
        self.values[x + self.dims[0] * (y + self.dims[1] * z)]
    }

    /// World-space position of a (possibly fractional) lattice coordinate.
    #[inline]
    pub fn position(&self, x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(
            self.origin[0] + x * self.spacing[0],
            self.origin[1] + y * self.spacing[1],
            self.origin[2] + z * self.spacing[2],
        )
    }

    /// Smallest and largest finite sample, or `None` when there are none.
    pub fn range(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Arithmetic mean of all samples (0 for an empty grid).
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().map(|&v| f64::from(v)).sum::<f64>() / self.values.len() as f64
    }
}
