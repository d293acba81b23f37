//! VTK XML polydata (`.vtp`) writer.
//!
//! Binary mode stores each `DataArray` inline as base64: a byte-count header
//! block of `header_type` width, then the raw little-endian payload block.

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use meshmaker_mesh::PolyData;
use meshmaker_shared::{MeshmakerError, Result};

use crate::{Encoding, HeaderWidth, IndexWidth, WriteOptions, checked_index};

/// Values of one `DataArray`, already in their output type.
enum ArrayData {
    Float32(Vec<f32>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
}

impl ArrayData {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Float32(_) => "Float32",
            Self::Int32(_) => "Int32",
            Self::Int64(_) => "Int64",
        }
    }

    fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::Float32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::Int32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::Int64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }

    fn to_ascii(&self) -> String {
        let words: Vec<String> = match self {
            Self::Float32(v) => v.iter().map(ToString::to_string).collect(),
            Self::Int32(v) => v.iter().map(ToString::to_string).collect(),
            Self::Int64(v) => v.iter().map(ToString::to_string).collect(),
        };
        words.join(" ")
    }
}

struct DataArray<'a> {
    name: &'a str,
    components: Option<usize>,
    data: ArrayData,
}

pub fn encode(mesh: &PolyData, options: &WriteOptions) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut writer = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);
    let xml = |e| xml_error("VTKFile", e);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
        .map_err(xml)?;

    let mut root = BytesStart::new("VTKFile");
    root.push_attribute(("type", "PolyData"));
    root.push_attribute(("version", "1.0"));
    root.push_attribute(("byte_order", "LittleEndian"));
    root.push_attribute(("header_type", options.header_width.name()));
    writer.write_event(Event::Start(root)).map_err(xml)?;
    writer
        .write_event(Event::Start(BytesStart::new("PolyData")))
        .map_err(xml)?;

    let mut piece = BytesStart::new("Piece");
    piece.push_attribute(("NumberOfPoints", mesh.num_points().to_string().as_str()));
    piece.push_attribute(("NumberOfVerts", "0"));
    piece.push_attribute(("NumberOfLines", "0"));
    piece.push_attribute(("NumberOfStrips", mesh.num_strips().to_string().as_str()));
    piece.push_attribute(("NumberOfPolys", mesh.num_polys().to_string().as_str()));
    writer.write_event(Event::Start(piece)).map_err(xml)?;

    #[allow(clippy::cast_possible_truncation)]
    let coords = mesh
        .points
        .iter()
        .flat_map(|p| [p.x as f32, p.y as f32, p.z as f32])
        .collect();
    let points = DataArray {
        name: "Points",
        components: Some(3),
        data: ArrayData::Float32(coords),
    };
    write_section(&mut writer, "Points", &[points], options)?;

    for (section, cells) in [
        ("Verts", &[][..]),
        ("Lines", &[][..]),
        ("Strips", mesh.strips.as_slice()),
        ("Polys", mesh.polys.as_slice()),
    ] {
        let (connectivity, offsets) = cell_arrays(cells, options.index_width)?;
        write_section(&mut writer, section, &[connectivity, offsets], options)?;
    }

    for tag in ["Piece", "PolyData", "VTKFile"] {
        writer.write_event(Event::End(BytesEnd::new(tag))).map_err(xml)?;
    }

    buffer.push(b'\n');
    Ok(buffer)
}

/// `connectivity` and end `offsets` arrays for a cell list.
fn cell_arrays(
    cells: &[Vec<u32>],
    width: IndexWidth,
) -> Result<(DataArray<'static>, DataArray<'static>)> {
    let ids = cells.iter().flatten().map(|&id| id as usize);
    let ends = cells.iter().scan(0usize, |end, cell| {
        *end += cell.len();
        Some(*end)
    });

    let (connectivity, offsets) = match width {
        IndexWidth::Int32 => (
            ArrayData::Int32(ids.map(|v| checked_index(v, "point id")).collect::<Result<_>>()?),
            ArrayData::Int32(ends.map(|v| checked_index(v, "cell offset")).collect::<Result<_>>()?),
        ),
        IndexWidth::Int64 => (
            ArrayData::Int64(ids.map(|v| checked_index(v, "point id")).collect::<Result<_>>()?),
            ArrayData::Int64(ends.map(|v| checked_index(v, "cell offset")).collect::<Result<_>>()?),
        ),
    };

    Ok((
        DataArray {
            name: "connectivity",
            components: None,
            data: connectivity,
        },
        DataArray {
            name: "offsets",
            components: None,
            data: offsets,
        },
    ))
}

fn write_section<W: std::io::Write>(
    writer: &mut Writer<W>,
    section: &str,
    arrays: &[DataArray<'_>],
    options: &WriteOptions,
) -> Result<()> {
    let xml = |e| xml_error(section, e);

    writer
        .write_event(Event::Start(BytesStart::new(section)))
        .map_err(xml)?;

    for array in arrays {
        let mut element = BytesStart::new("DataArray");
        element.push_attribute(("type", array.data.type_name()));
        element.push_attribute(("Name", array.name));
        if let Some(n) = array.components {
            element.push_attribute(("NumberOfComponents", n.to_string().as_str()));
        }

        let (format, body) = match options.encoding {
            Encoding::Ascii => ("ascii", array.data.to_ascii()),
            Encoding::Binary => {
                let payload = array.data.to_le_bytes();
                ("binary", inline_base64(&payload, options.header_width)?)
            }
        };
        element.push_attribute(("format", format));

        writer.write_event(Event::Start(element)).map_err(xml)?;
        writer
            .write_event(Event::Text(BytesText::new(&body)))
            .map_err(xml)?;
        writer
            .write_event(Event::End(BytesEnd::new("DataArray")))
            .map_err(xml)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(section)))
        .map_err(xml)?;
    Ok(())
}

fn xml_error(element: &str, e: impl std::fmt::Display) -> MeshmakerError {
    MeshmakerError::encode(format!("failed to write <{element}>: {e}"))
}

/// Base64 header block followed by base64 payload block.
///
/// A payload whose byte count does not fit the header type is an error.
fn inline_base64(payload: &[u8], width: HeaderWidth) -> Result<String> {
    let header = match width {
        HeaderWidth::UInt32 => block_size::<u32>(payload.len())?.to_le_bytes().to_vec(),
        HeaderWidth::UInt64 => block_size::<u64>(payload.len())?.to_le_bytes().to_vec(),
    };
    let mut text = STANDARD.encode(header);
    text.push_str(&STANDARD.encode(payload));
    Ok(text)
}

fn block_size<T: TryFrom<usize>>(len: usize) -> Result<T> {
    checked_index(len, "data array byte count")
}
