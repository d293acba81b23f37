//! Indexed polygon mesh with optional triangle strips.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};

/// Points plus two kinds of cells: polygons and triangle strips.
///
/// Polygon vertex order defines the face orientation (counter-clockwise seen
/// from the front). Strips follow the usual alternating convention, see
/// [`strip_triangles`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolyData {
    pub points: Vec<Point3<f64>>,
    pub polys: Vec<Vec<u32>>,
    pub strips: Vec<Vec<u32>>,
}

impl PolyData {
    pub fn new(points: Vec<Point3<f64>>, polys: Vec<Vec<u32>>) -> Self {
        Self {
            points,
            polys,
            strips: Vec::new(),
        }
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn num_polys(&self) -> usize {
        self.polys.len()
    }

    pub fn num_strips(&self) -> usize {
        self.strips.len()
    }

    /// Polygons plus strips.
    pub fn num_cells(&self) -> usize {
        self.polys.len() + self.strips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_cells() == 0
    }

    /// True when every cell is a polygon with exactly three vertices.
    pub fn is_triangle_mesh(&self) -> bool {
        self.strips.is_empty() && self.polys.iter().all(|p| p.len() == 3)
    }

    /// Every cell as triangles: polygons are fanned, strips decomposed.
    ///
    /// Cells with fewer than three vertices and triangles that repeat a
    /// vertex are skipped.
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        let mut out = Vec::with_capacity(self.polys.len());
        for poly in &self.polys {
            out.extend(fan(poly));
        }
        for strip in &self.strips {
            out.extend(strip_triangles(strip));
        }
        out.retain(|t| !is_degenerate(*t));
        out
    }

    /// Unit normal of a triangle, or zero for a zero-area triangle.
    pub fn triangle_normal(&self, tri: [u32; 3]) -> Vector3<f64> {
        let [a, b, c] = tri.map(|i| self.points[i as usize]);
        (b - a).cross(&(c - a)).try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros)
    }

    /// Undirected edges with the number of cells that use them.
    pub fn edge_use_counts(&self) -> HashMap<(u32, u32), usize> {
        let mut counts = HashMap::new();
        for poly in &self.polys {
            for (i, &a) in poly.iter().enumerate() {
                let b = poly[(i + 1) % poly.len()];
                if a != b {
                    *counts.entry(edge_key(a, b)).or_insert(0) += 1;
                }
            }
        }
        for tri in self.strips.iter().flat_map(|s| strip_triangles(s)) {
            for i in 0..3 {
                let (a, b) = (tri[i], tri[(i + 1) % 3]);
                if a != b {
                    *counts.entry(edge_key(a, b)).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` without points.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (lo.inf(p), hi.sup(p))
        }))
    }
}

/// Triangles of a strip, with odd triangles flipped to keep one winding.
pub fn strip_triangles(strip: &[u32]) -> impl Iterator<Item = [u32; 3]> + '_ {
    strip.windows(3).enumerate().map(|(i, w)| {
        if i % 2 == 0 {
            [w[0], w[1], w[2]]
        } else {
            [w[1], w[0], w[2]]
        }
    })
}

/// Fan a convex polygon around its first vertex.
pub(crate) fn fan(poly: &[u32]) -> impl Iterator<Item = [u32; 3]> + '_ {
    let apex = poly.first().copied().unwrap_or_default();
    poly.windows(2).skip(1).map(move |w| [apex, w[0], w[1]])
}

pub(crate) fn is_degenerate(t: [u32; 3]) -> bool {
    t[0] == t[1] || t[1] == t[2] || t[0] == t[2]
}

#[inline]
pub(crate) fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b { (a, b) } else { (b, a) }
}
