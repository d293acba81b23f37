//! Isosurface extraction by surface nets.
//!
//! One vertex is placed in every grid cell whose corners straddle the level,
//! at the mean of the crossings along the cell's edges. Every grid edge with
//! a sign change then emits one quad joining the four cells around it.

use meshmaker_volume::Volume;
use nalgebra::Point3;
use tracing::debug;

use crate::polydata::PolyData;

const NO_VERTEX: u32 = u32::MAX;

/// Cell corner offsets, bit 0 = x, bit 1 = y, bit 2 = z.
const CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

/// Cell edges as pairs of corner indices.
const EDGES: [[usize; 2]; 12] = [
    [0, 1],
    [2, 3],
    [4, 5],
    [6, 7],
    [0, 2],
    [1, 3],
    [4, 6],
    [5, 7],
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
];

/// Extract the surface where the density crosses `level`.
///
/// A sample is inside when `value >= level`. Quads are wound so their
/// normals point from inside to outside. The surface is open where it meets
/// the grid boundary.
pub fn extract_surface(volume: &Volume, level: f64) -> PolyData {
    let dims = volume.dims();
    if dims.iter().any(|&d| d < 2) {
        return PolyData::default();
    }

    let inside = |x: usize, y: usize, z: usize| f64::from(volume.value(x, y, z)) >= level;
    let cells = [dims[0] - 1, dims[1] - 1, dims[2] - 1];
    let cell_index = |c: [usize; 3]| c[0] + cells[0] * (c[1] + cells[1] * c[2]);

    // Pass 1: one vertex per boundary cell.
    let mut cell_vertex = vec![NO_VERTEX; cells.iter().product()];
    let mut points = Vec::new();
    for z in 0..cells[2] {
        for y in 0..cells[1] {
            for x in 0..cells[0] {
                let values = CORNERS.map(|o| f64::from(volume.value(x + o[0], y + o[1], z + o[2])));
                let mask = values
                    .iter()
                    .enumerate()
                    .fold(0u8, |m, (i, &v)| if v >= level { m | (1 << i) } else { m });
                if mask == 0 || mask == u8::MAX {
                    continue;
                }

                let local = cell_point(&values, level);
                cell_vertex[cell_index([x, y, z])] = points.len() as u32;
                points.push(volume.position(
                    x as f64 + local[0],
                    y as f64 + local[1],
                    z as f64 + local[2],
                ));
            }
        }
    }

    // Pass 2: one quad per sign-changing interior edge.
    let mut polys = Vec::new();
    for z in 0..dims[2] {
        for y in 0..dims[1] {
            for x in 0..dims[0] {
                let p = [x, y, z];
                let here = inside(x, y, z);
                for axis in 0..3 {
                    let b = (axis + 1) % 3;
                    let c = (axis + 2) % 3;
                    if p[axis] + 1 >= dims[axis] || p[b] == 0 || p[c] == 0 {
                        continue;
                    }
                    if p[b] >= dims[b] - 1 || p[c] >= dims[c] - 1 {
                        continue;
                    }

                    let mut q = p;
                    q[axis] += 1;
                    if here == inside(q[0], q[1], q[2]) {
                        continue;
                    }

                    // Cells around the edge, counter-clockwise seen from +axis.
                    let ring = [(1, 1), (0, 1), (0, 0), (1, 0)].map(|(db, dc)| {
                        let mut cell = p;
                        cell[b] -= db;
                        cell[c] -= dc;
                        cell_vertex[cell_index(cell)]
                    });
                    if ring.contains(&NO_VERTEX) {
                        continue;
                    }

                    let quad = if here {
                        ring.to_vec()
                    } else {
                        ring.iter().rev().copied().collect()
                    };
                    polys.push(quad);
                }
            }
        }
    }

    debug!(points = points.len(), quads = polys.len(), level, "extracted surface");
    PolyData::new(points, polys)
}

/// Mean of the edge crossings inside a unit cell, in cell-local coordinates.
fn cell_point(values: &[f64; 8], level: f64) -> [f64; 3] {
    let mut sum = Point3::origin();
    let mut crossings = 0usize;

    for [i, j] in EDGES {
        let (vi, vj) = (values[i], values[j]);
        if (vi >= level) == (vj >= level) {
            continue;
        }
        let delta = vj - vi;
        let t = if delta.abs() > f64::EPSILON {
            ((level - vi) / delta).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let a = CORNERS[i].map(|c| c as f64);
        let b = CORNERS[j].map(|c| c as f64);
        sum += nalgebra::Vector3::new(
            a[0] + t * (b[0] - a[0]),
            a[1] + t * (b[1] - a[1]),
            a[2] + t * (b[2] - a[2]),
        );
        crossings += 1;
    }

    if crossings == 0 {
        return [0.5; 3];
    }
    let mean = sum / crossings as f64;
    [mean.x, mean.y, mean.z]
}
