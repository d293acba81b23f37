//! Progressive decimation by quadric-error edge collapse.
//!
//! Edges are collapsed cheapest first until the face count reaches the
//! target. Collapses that would change the surface topology are refused,
//! so a mesh can finish above its target:
//!
//! - the link condition must hold (the endpoints share exactly the vertices
//!   opposite the edge)
//! - an interior edge joining two boundary vertices is never collapsed
//! - no vertex may be left with too few neighbours (this also protects
//!   closed tetrahedra)
//! - no surviving face may flip or become degenerate

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use meshmaker_shared::{MeshmakerError, Result};
use nalgebra::{Point3, Vector3};
use tracing::{debug, info};

use crate::polydata::{PolyData, edge_key, is_degenerate};
use crate::quadric::Quadric;

/// Weight of the planes that hold boundary edges in place.
const BOUNDARY_WEIGHT: f64 = 1000.0;

/// An edge collapse candidate in the priority queue.
#[derive(Debug, Clone)]
struct EdgeCollapse {
    /// Surviving vertex.
    keep: u32,
    /// Vertex merged into `keep`.
    remove: u32,
    cost: f64,
    position: Point3<f64>,
    /// Vertex versions when the candidate was computed.
    stamp: (u32, u32),
}

impl PartialEq for EdgeCollapse {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EdgeCollapse {}

impl PartialOrd for EdgeCollapse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCollapse {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behaviour; ties broken by vertex ids.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.keep.cmp(&self.keep))
            .then_with(|| other.remove.cmp(&self.remove))
    }
}

/// Decimate a triangle mesh, removing `target_reduction` of its faces.
///
/// `target_reduction` must lie in (0, 1); the goal is
/// `ceil((1 - target_reduction) * triangles)` faces. Points not used by
/// any remaining face are dropped. Any non-triangle cell is an error.
pub fn decimate(mesh: PolyData, target_reduction: f64) -> Result<PolyData> {
    if !(target_reduction > 0.0 && target_reduction < 1.0) {
        return Err(MeshmakerError::geometry(format!(
            "target reduction {target_reduction} is outside (0, 1)"
        )));
    }
    if !mesh.is_triangle_mesh() {
        return Err(MeshmakerError::geometry(
            "decimation requires a triangle mesh; triangulate first",
        ));
    }

    let original = mesh.num_polys();
    let target = ((1.0 - target_reduction) * original as f64).ceil() as usize;
    if original <= target {
        return Ok(mesh);
    }

    info!(original, target, "starting decimation");

    let mut state = Collapser::new(mesh);
    let mut heap = state.initial_queue();
    let mut performed = 0usize;
    let mut rejected = 0usize;

    while state.alive_faces > target {
        let Some(candidate) = heap.pop() else {
            break;
        };
        if !state.is_current(&candidate) {
            continue;
        }
        if !state.is_collapse_valid(&candidate) {
            rejected += 1;
            continue;
        }

        state.collapse(&candidate);
        performed += 1;

        let keep = candidate.keep;
        for neighbour in state.neighbours(keep) {
            heap.push(state.candidate(keep, neighbour));
        }
    }

    let result = state.into_polydata();
    info!(
        original,
        target,
        remaining = result.num_polys(),
        performed,
        rejected,
        "decimation finished"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Working state
// ---------------------------------------------------------------------------

struct Collapser {
    points: Vec<Point3<f64>>,
    faces: Vec<[u32; 3]>,
    face_alive: Vec<bool>,
    /// Faces touching each vertex; may include dead faces.
    vertex_faces: Vec<Vec<usize>>,
    vertex_alive: Vec<bool>,
    quadrics: Vec<Quadric>,
    versions: Vec<u32>,
    alive_faces: usize,
}

impl Collapser {
    fn new(mesh: PolyData) -> Self {
        let PolyData { points, polys, .. } = mesh;
        let faces: Vec<[u32; 3]> = polys.iter().map(|p| [p[0], p[1], p[2]]).collect();
        let face_alive: Vec<bool> = faces.iter().map(|&f| !is_degenerate(f)).collect();
        let alive_faces = face_alive.iter().filter(|&&a| a).count();

        let n = points.len();
        let mut vertex_faces = vec![Vec::new(); n];
        for (f, face) in faces.iter().enumerate() {
            if face_alive[f] {
                for &v in face {
                    vertex_faces[v as usize].push(f);
                }
            }
        }

        let mut state = Self {
            points,
            faces,
            face_alive,
            vertex_faces,
            vertex_alive: vec![true; n],
            quadrics: vec![Quadric::default(); n],
            versions: vec![0; n],
            alive_faces,
        };
        state.seed_quadrics();
        state
    }

    /// Area-weighted face planes plus perpendicular planes along boundary edges.
    fn seed_quadrics(&mut self) {
        for f in 0..self.faces.len() {
            if !self.face_alive[f] {
                continue;
            }
            let face = self.faces[f];
            let [a, b, c] = face.map(|v| self.points[v as usize]);
            let cross = (b - a).cross(&(c - a));
            let area = cross.norm() * 0.5;
            let Some(normal) = cross.try_normalize(f64::EPSILON) else {
                continue;
            };

            let plane = Quadric::from_plane(normal, &a) * area;
            for &v in &face {
                self.quadrics[v as usize] += plane;
            }

            for i in 0..3 {
                let (u, w) = (face[i], face[(i + 1) % 3]);
                if self.edge_faces(u, w).len() != 1 {
                    continue;
                }
                let (pu, pw) = (self.points[u as usize], self.points[w as usize]);
                let edge = pw - pu;
                let Some(side) = edge.cross(&normal).try_normalize(f64::EPSILON) else {
                    continue;
                };
                let constraint =
                    Quadric::from_plane(side, &pu) * (BOUNDARY_WEIGHT * edge.norm_squared());
                self.quadrics[u as usize] += constraint;
                self.quadrics[w as usize] += constraint;
            }
        }
    }

    fn initial_queue(&self) -> BinaryHeap<EdgeCollapse> {
        let mut edges = BTreeSet::new();
        for (f, face) in self.faces.iter().enumerate() {
            if !self.face_alive[f] {
                continue;
            }
            for i in 0..3 {
                edges.insert(edge_key(face[i], face[(i + 1) % 3]));
            }
        }
        edges.into_iter().map(|(a, b)| self.candidate(a, b)).collect()
    }

    fn alive_faces_of(&self, v: u32) -> impl Iterator<Item = usize> + '_ {
        self.vertex_faces[v as usize]
            .iter()
            .copied()
            .filter(|&f| self.face_alive[f])
    }

    fn neighbours(&self, v: u32) -> BTreeSet<u32> {
        self.alive_faces_of(v)
            .flat_map(|f| self.faces[f])
            .filter(|&w| w != v)
            .collect()
    }

    fn edge_faces(&self, u: u32, v: u32) -> Vec<usize> {
        self.alive_faces_of(u)
            .filter(|&f| self.faces[f].contains(&v))
            .collect()
    }

    fn is_boundary_vertex(&self, v: u32) -> bool {
        self.neighbours(v)
            .into_iter()
            .any(|w| self.edge_faces(v, w).len() != 2)
    }

    fn candidate(&self, keep: u32, remove: u32) -> EdgeCollapse {
        let quadric = self.quadrics[keep as usize] + self.quadrics[remove as usize];
        let (pk, pr) = (self.points[keep as usize], self.points[remove as usize]);

        let options = match (self.is_boundary_vertex(keep), self.is_boundary_vertex(remove)) {
            (true, false) => vec![pk],
            (false, true) => vec![pr],
            _ => {
                let mut options = vec![pk, pr, nalgebra::center(&pk, &pr)];
                options.extend(quadric.minimizer());
                options
            }
        };

        let (position, cost) = options
            .into_iter()
            .map(|p| (p, quadric.error(&p)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((pk, quadric.error(&pk)));

        EdgeCollapse {
            keep,
            remove,
            cost,
            position,
            stamp: (self.versions[keep as usize], self.versions[remove as usize]),
        }
    }

    fn is_current(&self, c: &EdgeCollapse) -> bool {
        self.vertex_alive[c.keep as usize]
            && self.vertex_alive[c.remove as usize]
            && c.stamp == (self.versions[c.keep as usize], self.versions[c.remove as usize])
    }

    fn is_collapse_valid(&self, c: &EdgeCollapse) -> bool {
        let (keep, remove) = (c.keep, c.remove);
        let shared = self.edge_faces(keep, remove);
        if shared.is_empty() || shared.len() > 2 {
            return false;
        }

        let keep_ring = self.neighbours(keep);
        let remove_ring = self.neighbours(remove);

        // Link condition.
        let common: BTreeSet<u32> = keep_ring.intersection(&remove_ring).copied().collect();
        let opposite: BTreeSet<u32> = shared
            .iter()
            .flat_map(|&f| self.faces[f])
            .filter(|&w| w != keep && w != remove)
            .collect();
        if common != opposite {
            return false;
        }

        let interior_edge = shared.len() == 2;
        if interior_edge && self.is_boundary_vertex(keep) && self.is_boundary_vertex(remove) {
            return false;
        }

        let merged_degree = keep_ring.union(&remove_ring).count() - 2;
        if interior_edge && merged_degree < 3 {
            return false;
        }
        for &w in &opposite {
            if !self.is_boundary_vertex(w) && self.neighbours(w).len() <= 3 {
                return false;
            }
        }

        !self.any_face_flips(c, &shared)
    }

    fn any_face_flips(&self, c: &EdgeCollapse, shared: &[usize]) -> bool {
        let moved = self
            .alive_faces_of(c.keep)
            .chain(self.alive_faces_of(c.remove))
            .filter(|f| !shared.contains(f));

        for f in moved {
            let face = self.faces[f];
            let before = self.face_cross(face.map(|v| self.points[v as usize]));
            let after = self.face_cross(face.map(|v| {
                if v == c.keep || v == c.remove {
                    c.position
                } else {
                    self.points[v as usize]
                }
            }));

            let Some(after_n) = after.try_normalize(1e-12) else {
                return true;
            };
            if let Some(before_n) = before.try_normalize(1e-12) {
                if before_n.dot(&after_n) <= 0.0 {
                    return true;
                }
            }
        }
        false
    }

    fn face_cross(&self, [a, b, c]: [Point3<f64>; 3]) -> Vector3<f64> {
        (b - a).cross(&(c - a))
    }

    fn collapse(&mut self, c: &EdgeCollapse) {
        let (keep, remove) = (c.keep, c.remove);

        for f in self.edge_faces(keep, remove) {
            self.face_alive[f] = false;
            self.alive_faces -= 1;
        }

        let moved: Vec<usize> = self.alive_faces_of(remove).collect();
        for f in moved {
            for v in &mut self.faces[f] {
                if *v == remove {
                    *v = keep;
                }
            }
            self.vertex_faces[keep as usize].push(f);
        }
        self.vertex_faces[remove as usize].clear();
        self.vertex_faces[keep as usize].retain(|&f| self.face_alive[f]);

        self.vertex_alive[remove as usize] = false;
        self.points[keep as usize] = c.position;
        let absorbed = self.quadrics[remove as usize];
        self.quadrics[keep as usize] += absorbed;
        self.versions[keep as usize] += 1;
        self.versions[remove as usize] += 1;

        debug!(keep, remove, cost = c.cost, "collapsed edge");
    }

    /// Remaining faces in original order over the points they still use.
    fn into_polydata(self) -> PolyData {
        let mut remap = vec![u32::MAX; self.points.len()];
        for (f, face) in self.faces.iter().enumerate() {
            if self.face_alive[f] {
                for &v in face {
                    remap[v as usize] = 0;
                }
            }
        }

        let mut points = Vec::new();
        for (old, slot) in remap.iter_mut().enumerate() {
            if *slot == 0 {
                *slot = points.len() as u32;
                points.push(self.points[old]);
            }
        }

        let polys = self
            .faces
            .iter()
            .zip(&self.face_alive)
            .filter(|(_, alive)| **alive)
            .map(|(face, _)| face.iter().map(|&v| remap[v as usize]).collect())
            .collect();

        PolyData::new(points, polys)
    }
}
