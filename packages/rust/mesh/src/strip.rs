//! Greedy triangle strip generation.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::polydata::{PolyData, is_degenerate};

/// Join adjacent, consistently wound triangles into strips.
///
/// Each strip holds at most `max_length` triangles. Triangles that could
/// not be joined to a neighbour, and polygons that are not triangles, stay
/// in `polys`. Existing strips are kept as they are.
pub fn strip(mesh: PolyData, max_length: usize) -> PolyData {
    let PolyData {
        points,
        polys,
        strips: mut existing,
    } = mesh;

    let max_length = max_length.max(1);
    let mut leftover = Vec::new();
    let mut triangles = Vec::new();
    for poly in polys {
        if let &[a, b, c] = poly.as_slice() {
            if !is_degenerate([a, b, c]) {
                triangles.push([a, b, c]);
                continue;
            }
        }
        leftover.push(poly);
    }

    // Directed edge -> triangles containing it in that direction.
    let mut by_edge: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
    for (t, tri) in triangles.iter().enumerate() {
        for i in 0..3 {
            by_edge.entry((tri[i], tri[(i + 1) % 3])).or_default().push(t);
        }
    }

    let mut used = vec![false; triangles.len()];
    let mut strips = Vec::new();
    for start in 0..triangles.len() {
        if used[start] {
            continue;
        }

        // Try every starting vertex in both parities; prefer more triangles,
        // then fewer padding vertices.
        let best = (0..3)
            .flat_map(|rotation| [(rotation, false), (rotation, true)])
            .map(|(rotation, padded)| {
                grow(&triangles, &by_edge, &used, start, rotation, padded, max_length)
            })
            .max_by_key(|(vertices, members)| (members.len(), Reverse(vertices.len())));

        match best {
            Some((vertices, members)) if members.len() > 1 => {
                for &t in &members {
                    used[t] = true;
                }
                strips.push(vertices);
            }
            _ => {
                used[start] = true;
                leftover.push(triangles[start].to_vec());
            }
        }
    }

    debug!(
        strips = strips.len(),
        polys = leftover.len(),
        "generated triangle strips"
    );
    strips.append(&mut existing);
    PolyData {
        points,
        polys: leftover,
        strips,
    }
}

/// Walk forward from `start`, rotated so the strip begins at vertex
/// `rotation`, and return the strip vertices with the triangles consumed.
///
/// A `padded` strip opens with a repeated vertex. The zero-area triangle
/// it creates shifts the parity so the walk can leave through the other
/// edge of the starting triangle.
fn grow(
    triangles: &[[u32; 3]],
    by_edge: &HashMap<(u32, u32), Vec<usize>>,
    used: &[bool],
    start: usize,
    rotation: usize,
    padded: bool,
    max_length: usize,
) -> (Vec<u32>, Vec<usize>) {
    let [a, b, c] = [0, 1, 2].map(|i| triangles[start][(rotation + i) % 3]);
    let mut vertices = if padded { vec![a, a, c, b] } else { vec![a, b, c] };
    let mut members = vec![start];
    let mut taken: HashSet<usize> = HashSet::from([start]);

    while vertices.len() - 2 < max_length {
        let n = vertices.len();
        let (p, q) = (vertices[n - 2], vertices[n - 1]);
        // Even triangles read (p, q, next); odd ones read (q, p, next).
        let edge = if (n - 2) % 2 == 0 { (p, q) } else { (q, p) };

        let Some(next) = by_edge.get(&edge).and_then(|candidates| {
            candidates
                .iter()
                .copied()
                .find(|&t| !used[t] && !taken.contains(&t))
        }) else {
            break;
        };

        let t = triangles[next];
        let Some(at) = (0..3).find(|&i| (t[i], t[(i + 1) % 3]) == edge) else {
            break;
        };
        vertices.push(t[(at + 2) % 3]);
        members.push(next);
        taken.insert(next);
    }

    (vertices, members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polydata::strip_triangles;
    use nalgebra::Point3;

    /// Row of `n` unit squares split into `2n` triangles, all facing +z.
    fn ribbon(n: u32) -> PolyData {
        let mut points = Vec::new();
        for x in 0..=n {
            points.push(Point3::new(f64::from(x), 0.0, 0.0));
            points.push(Point3::new(f64::from(x), 1.0, 0.0));
        }
        let mut polys = Vec::new();
        for x in 0..n {
            let (b0, t0, b1, t1) = (2 * x, 2 * x + 1, 2 * x + 2, 2 * x + 3);
            polys.push(vec![b0, b1, t0]);
            polys.push(vec![t0, b1, t1]);
        }
        PolyData::new(points, polys)
    }

    fn sorted(mut tris: Vec<[u32; 3]>) -> Vec<[u32; 3]> {
        for t in &mut tris {
            let min = (0..3).min_by_key(|&i| t[i]).unwrap_or(0);
            t.rotate_left(min);
        }
        tris.sort_unstable();
        tris
    }

    #[test]
    fn ribbon_becomes_one_strip() {
        let mesh = ribbon(4);
        let before = sorted(mesh.triangles());
        let out = strip(mesh, 1000);

        assert_eq!(out.num_strips(), 1);
        assert_eq!(out.num_polys(), 0);
        assert_eq!(out.triangles().len(), 8);
        assert_eq!(sorted(out.triangles()), before);
    }

    #[test]
    fn winding_is_preserved() {
        let out = strip(ribbon(3), 1000);
        let tris: Vec<_> = strip_triangles(&out.strips[0])
            .filter(|&t| !is_degenerate(t))
            .collect();
        assert_eq!(tris.len(), 6);
        for tri in tris {
            assert!(out.triangle_normal(tri).z > 0.0);
        }
    }

    #[test]
    fn strips_respect_maximum_length() {
        let mesh = ribbon(5);
        let before = sorted(mesh.triangles());
        let out = strip(mesh, 3);

        for s in &out.strips {
            assert!(s.len() - 2 <= 3);
        }
        assert_eq!(sorted(out.triangles()), before);
    }

    #[test]
    fn isolated_triangle_stays_a_polygon() {
        let mesh = PolyData::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![vec![0, 1, 2]],
        );
        let out = strip(mesh, 1000);
        assert_eq!(out.num_strips(), 0);
        assert_eq!(out.polys.len(), 1);
        assert_eq!(sorted(out.triangles()), vec![[0, 1, 2]]);
    }

    #[test]
    fn quads_are_left_alone() {
        let mut mesh = ribbon(2);
        mesh.polys.push(vec![0, 2, 3, 1]);
        let out = strip(mesh, 1000);
        assert!(out.polys.contains(&vec![0, 2, 3, 1]));
        assert_eq!(out.num_strips(), 1);
    }

    #[test]
    fn every_triangle_is_kept_on_a_closed_surface() {
        let volume = meshmaker_volume::Volume::from_fn([10, 10, 10], [1.0; 3], [0.0; 3], |x, y, z| {
            let d = ((x as f64 - 4.5).powi(2) + (y as f64 - 4.5).powi(2) + (z as f64 - 4.5).powi(2))
                .sqrt();
            (3.0 - d) as f32
        })
        .unwrap();
        let mesh = crate::triangulate(crate::extract_surface(&volume, 0.0));
        let before = sorted(mesh.triangles());
        let out = strip(mesh, 1000);

        assert!(out.num_strips() > 0);
        assert!(out.num_cells() < before.len());
        assert_eq!(sorted(out.triangles()), before);
    }
}
