//! Reduce every cell to triangles.

use tracing::debug;

use crate::polydata::{PolyData, fan, is_degenerate, strip_triangles};

/// Convert polygons and strips into a pure triangle mesh.
///
/// Polygons are fanned around their first vertex, strips are decomposed
/// keeping a consistent winding, and triangles that repeat a vertex are
/// dropped along with cells of fewer than three vertices.
pub fn triangulate(mesh: PolyData) -> PolyData {
    let PolyData {
        points,
        polys,
        strips,
    } = mesh;

    let mut triangles = Vec::with_capacity(polys.len() * 2);
    for poly in &polys {
        triangles.extend(fan(poly).filter(|t| !is_degenerate(*t)).map(Vec::from));
    }
    for strip in &strips {
        triangles.extend(strip_triangles(strip).filter(|t| !is_degenerate(*t)).map(Vec::from));
    }

    debug!(
        polys = polys.len(),
        strips = strips.len(),
        triangles = triangles.len(),
        "triangulated"
    );
    PolyData::new(points, triangles)
}
