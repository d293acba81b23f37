//! Legacy VTK (`# vtk DataFile Version 3.0`) polydata writer.
//!
//! Binary sections are big-endian, as the legacy format requires.

#![allow(clippy::cast_possible_truncation)]

use std::fmt::Write as _;

use meshmaker_mesh::PolyData;
use meshmaker_shared::Result;

use crate::{Encoding, checked_index};

const TITLE: &str = "meshmaker output";

pub fn encode(mesh: &PolyData, encoding: Encoding) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mode = match encoding {
        Encoding::Ascii => "ASCII",
        Encoding::Binary => "BINARY",
    };
    push_line(&mut out, "# vtk DataFile Version 3.0");
    push_line(&mut out, TITLE);
    push_line(&mut out, mode);
    push_line(&mut out, "DATASET POLYDATA");

    push_line(&mut out, &format!("POINTS {} float", mesh.num_points()));
    match encoding {
        Encoding::Ascii => {
            let mut text = String::new();
            for p in &mesh.points {
                let _ = writeln!(text, "{} {} {}", p.x as f32, p.y as f32, p.z as f32);
            }
            out.extend_from_slice(text.as_bytes());
        }
        Encoding::Binary => {
            for p in &mesh.points {
                for c in p.coords.iter() {
                    out.extend_from_slice(&(*c as f32).to_be_bytes());
                }
            }
            out.push(b'\n');
        }
    }

    write_cells(&mut out, "POLYGONS", &mesh.polys, encoding)?;
    write_cells(&mut out, "TRIANGLE_STRIPS", &mesh.strips, encoding)?;
    Ok(out)
}

/// `KEYWORD n size` followed by `count id...` per cell. Empty sections are omitted.
fn write_cells(
    out: &mut Vec<u8>,
    keyword: &str,
    cells: &[Vec<u32>],
    encoding: Encoding,
) -> Result<()> {
    if cells.is_empty() {
        return Ok(());
    }

    let size = cells.iter().map(|c| c.len() + 1).sum::<usize>();
    let size: i32 = checked_index(size, "cell list size")?;
    push_line(out, &format!("{keyword} {} {size}", cells.len()));

    match encoding {
        Encoding::Ascii => {
            let mut text = String::new();
            for cell in cells {
                let _ = write!(text, "{}", cell.len());
                for id in cell {
                    let _ = write!(text, " {id}");
                }
                text.push('\n');
            }
            out.extend_from_slice(text.as_bytes());
        }
        Encoding::Binary => {
            for cell in cells {
                let n: i32 = checked_index(cell.len(), "cell size")?;
                out.extend_from_slice(&n.to_be_bytes());
                for &id in cell {
                    let id: i32 = checked_index(id as usize, "point id")?;
                    out.extend_from_slice(&id.to_be_bytes());
                }
            }
            out.push(b'\n');
        }
    }
    Ok(())
}

fn push_line(out: &mut Vec<u8>, line: &str) {
    out.extend_from_slice(line.as_bytes());
    out.push(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::two_triangles;

    #[test]
    fn ascii_file() {
        let text = String::from_utf8(encode(&two_triangles(), Encoding::Ascii).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# vtk DataFile Version 3.0");
        assert_eq!(lines[2], "ASCII");
        assert_eq!(lines[3], "DATASET POLYDATA");
        assert_eq!(lines[4], "POINTS 4 float");
        assert_eq!(lines[6], "1 0 0");
        assert_eq!(lines[9], "POLYGONS 2 8");
        assert_eq!(lines[10], "3 0 1 2");
        assert_eq!(lines[11], "3 0 2 3");
        assert!(!text.contains("TRIANGLE_STRIPS"));
    }

    #[test]
    fn strips_get_their_own_section() {
        let mut mesh = two_triangles();
        mesh.polys.clear();
        mesh.strips.push(vec![1, 2, 0, 3]);
        let text = String::from_utf8(encode(&mesh, Encoding::Ascii).unwrap()).unwrap();
        assert!(text.contains("TRIANGLE_STRIPS 1 5\n4 1 2 0 3\n"));
        assert!(!text.contains("POLYGONS"));
    }

    #[test]
    fn binary_is_big_endian() {
        let bytes = encode(&two_triangles(), Encoding::Binary).unwrap();
        let header: &[u8] = b"# vtk DataFile Version 3.0\nmeshmaker output\nBINARY\n\
            DATASET POLYDATA\nPOINTS 4 float\n";
        assert!(bytes.starts_with(header));

        let points = &bytes[header.len()..header.len() + 48];
        // Point 1 x = 1.0
        assert_eq!(&points[12..16], &1.0f32.to_be_bytes());

        let rest = &bytes[header.len() + 48..];
        let polys = b"\nPOLYGONS 2 8\n";
        assert!(rest.starts_with(polys));
        let ids = &rest[polys.len()..];
        assert_eq!(&ids[0..4], &3i32.to_be_bytes());
        assert_eq!(&ids[8..12], &1i32.to_be_bytes());
        assert_eq!(ids.len(), 8 * 4 + 1);
    }
}
