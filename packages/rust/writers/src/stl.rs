//! STL writer.

#![allow(clippy::cast_possible_truncation)]

use std::fmt::Write as _;

use meshmaker_mesh::PolyData;
use meshmaker_shared::Result;
use nalgebra::Vector3;

use crate::{Encoding, checked_index};

const HEADER_SIZE: usize = 80;
const HEADER_TEXT: &[u8] = b"meshmaker generated STL";
const SOLID_NAME: &str = "meshmaker";

/// Encode every cell as facets; polygons are fanned and strips decomposed.
pub fn encode(mesh: &PolyData, encoding: Encoding) -> Result<Vec<u8>> {
    let facets: Vec<(Vector3<f64>, [u32; 3])> = mesh
        .triangles()
        .into_iter()
        .map(|tri| (mesh.triangle_normal(tri), tri))
        .collect();

    match encoding {
        Encoding::Binary => encode_binary(mesh, &facets),
        Encoding::Ascii => Ok(encode_ascii(mesh, &facets)),
    }
}

fn encode_binary(mesh: &PolyData, facets: &[(Vector3<f64>, [u32; 3])]) -> Result<Vec<u8>> {
    let count: u32 = checked_index(facets.len(), "facet count")?;

    let mut out = Vec::with_capacity(HEADER_SIZE + 4 + facets.len() * 50);
    let mut header = [b' '; HEADER_SIZE];
    header[..HEADER_TEXT.len()].copy_from_slice(HEADER_TEXT);
    out.extend_from_slice(&header);
    out.extend_from_slice(&count.to_le_bytes());

    for (normal, tri) in facets {
        for c in normal.iter() {
            out.extend_from_slice(&(*c as f32).to_le_bytes());
        }
        for &v in tri {
            let p = mesh.points[v as usize];
            for c in p.coords.iter() {
                out.extend_from_slice(&(*c as f32).to_le_bytes());
            }
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    Ok(out)
}

fn encode_ascii(mesh: &PolyData, facets: &[(Vector3<f64>, [u32; 3])]) -> Vec<u8> {
    let mut out = String::new();
    let _ = writeln!(out, "solid {SOLID_NAME}");
    for (n, tri) in facets {
        let _ = writeln!(out, "  facet normal {:e} {:e} {:e}", n.x as f32, n.y as f32, n.z as f32);
        out.push_str("    outer loop\n");
        for &v in tri {
            let p = mesh.points[v as usize];
            let _ = writeln!(
                out,
                "      vertex {:e} {:e} {:e}",
                p.x as f32, p.y as f32, p.z as f32
            );
        }
        out.push_str("    endloop\n");
        out.push_str("  endfacet\n");
    }
    let _ = writeln!(out, "endsolid {SOLID_NAME}");
    out.into_bytes()
}
