//! Laplacian smoothing.

use std::collections::BTreeSet;

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::polydata::PolyData;

/// Fraction of the way each vertex moves toward its neighbour centroid per pass.
pub const DEFAULT_RELAXATION: f64 = 0.01;

/// Boundary vertices bending more than this (degrees) are corners.
const CORNER_ANGLE: f64 = 15.0;

/// How a vertex takes part in smoothing.
#[derive(Debug, Clone, PartialEq)]
enum Role {
    /// Not moved: isolated points and boundary corners.
    Fixed,
    /// Moves toward the centroid of these neighbours.
    Free(Vec<u32>),
}

/// Relax vertex positions toward their neighbours for `iterations` passes.
///
/// Interior vertices use every edge neighbour. Vertices on the boundary
/// (edges used by one cell, or by more than two) use only their boundary
/// neighbours, so the outline is smoothed along itself. A boundary vertex
/// with other than two boundary neighbours, or where the outline bends by
/// more than 15 degrees, is a corner and stays put.
/// Connectivity is unchanged.
pub fn smooth(mesh: PolyData, iterations: u32, relaxation: f64) -> PolyData {
    if iterations == 0 || mesh.points.is_empty() {
        return mesh;
    }

    let roles = vertex_roles(&mesh);
    let PolyData {
        mut points,
        polys,
        strips,
    } = mesh;

    let mut next = points.clone();
    for _ in 0..iterations {
        for (i, role) in roles.iter().enumerate() {
            let Role::Free(neighbours) = role else {
                continue;
            };
            let sum = neighbours
                .iter()
                .fold(Vector3::zeros(), |acc, &n| acc + points[n as usize].coords);
            let centroid = Point3::from(sum / neighbours.len() as f64);
            next[i] = points[i] + (centroid - points[i]) * relaxation;
        }
        std::mem::swap(&mut points, &mut next);
    }

    debug!(iterations, relaxation, points = points.len(), "smoothed");
    PolyData {
        points,
        polys,
        strips,
    }
}

fn vertex_roles(mesh: &PolyData) -> Vec<Role> {
    let counts = mesh.edge_use_counts();
    let n = mesh.points.len();

    let mut all: Vec<BTreeSet<u32>> = vec![BTreeSet::new(); n];
    let mut boundary: Vec<BTreeSet<u32>> = vec![BTreeSet::new(); n];
    for (&(a, b), &uses) in &counts {
        all[a as usize].insert(b);
        all[b as usize].insert(a);
        if uses != 2 {
            boundary[a as usize].insert(b);
            boundary[b as usize].insert(a);
        }
    }

    let min_cos = CORNER_ANGLE.to_radians().cos();
    all.into_iter()
        .zip(boundary)
        .enumerate()
        .map(|(i, (all, boundary))| match (all.is_empty(), boundary.len()) {
            (true, _) => Role::Fixed,
            (false, 0) => Role::Free(all.into_iter().collect()),
            (false, 2) => {
                let ends: Vec<u32> = boundary.into_iter().collect();
                let here = mesh.points[i];
                let incoming = here - mesh.points[ends[0] as usize];
                let outgoing = mesh.points[ends[1] as usize] - here;
                let straight = incoming
                    .try_normalize(f64::EPSILON)
                    .zip(outgoing.try_normalize(f64::EPSILON))
                    .is_some_and(|(a, b)| a.dot(&b) >= min_cos);
                if straight { Role::Free(ends) } else { Role::Fixed }
            }
            (false, _) => Role::Fixed,
        })
        .collect()
}
