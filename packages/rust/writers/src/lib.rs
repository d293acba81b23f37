//! Mesh file writers.
//!
//! Supported outputs:
//!
//! - **STL** (binary or ASCII)
//! - **Legacy VTK** 3.0 polydata (binary or ASCII)
//! - **VTK XML** `.vtp` polydata (inline base64 or ASCII)
//!
//! [`write_mesh`] encodes the whole file in memory, writes it to a hidden
//! temp file next to the target and renames it into place, so a failed run
//! never leaves a truncated file behind.

pub mod legacy;
pub mod stl;
pub mod vtp;

use std::path::{Path, PathBuf};

use meshmaker_mesh::PolyData;
use meshmaker_shared::{MeshmakerError, OutputFormat, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

/// Byte layout of the written data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    Ascii,
    #[default]
    Binary,
}

/// Integer type of the per-array byte-count header in binary VTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderWidth {
    #[default]
    UInt32,
    UInt64,
}

impl HeaderWidth {
    pub const fn name(self) -> &'static str {
        match self {
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
        }
    }
}

/// Integer type of VTP connectivity and offset arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexWidth {
    Int32,
    #[default]
    Int64,
}

impl IndexWidth {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
        }
    }
}

/// Everything a writer needs to know besides the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    pub format: OutputFormat,
    pub encoding: Encoding,
    /// Only used by the VTP writer.
    pub header_width: HeaderWidth,
    /// Only used by the VTP writer.
    pub index_width: IndexWidth,
}

/// Summary of a completed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub size_bytes: usize,
    /// Hex SHA-256 of the file contents.
    pub sha256: String,
}

/// Encode `mesh` in the requested format.
pub fn encode(mesh: &PolyData, options: &WriteOptions) -> Result<Vec<u8>> {
    match options.format {
        OutputFormat::Stl => stl::encode(mesh, options.encoding),
        OutputFormat::LegacyVtk => legacy::encode(mesh, options.encoding),
        OutputFormat::XmlVtp => vtp::encode(mesh, options),
    }
}

/// Encode `mesh` and place it at `path` atomically.
#[instrument(skip_all, fields(path = %path.display(), format = %options.format))]
pub fn write_mesh(mesh: &PolyData, path: &Path, options: &WriteOptions) -> Result<WriteReport> {
    let bytes = encode(mesh, options)?;
    place_atomically(path, &bytes)?;

    let sha256 = format!("{:x}", Sha256::digest(&bytes));
    info!(size = bytes.len(), %sha256, "wrote mesh");

    Ok(WriteReport {
        path: path.to_path_buf(),
        format: options.format,
        size_bytes: bytes.len(),
        sha256,
    })
}

/// Write to `.<name>.tmp` beside `target`, then rename over it.
fn place_atomically(target: &Path, bytes: &[u8]) -> Result<()> {
    let name = target
        .file_name()
        .ok_or_else(|| MeshmakerError::encode(format!("{} is not a file path", target.display())))?;
    let temp = target.with_file_name(format!(".{}.tmp", name.to_string_lossy()));

    if let Err(e) = std::fs::write(&temp, bytes) {
        let _ = std::fs::remove_file(&temp);
        return Err(MeshmakerError::io(&temp, e));
    }

    if let Err(e) = std::fs::rename(&temp, target) {
        let _ = std::fs::remove_file(&temp);
        return Err(MeshmakerError::io(target, e));
    }

    debug!(temp = %temp.display(), "renamed into place");
    Ok(())
}

/// Convert a vertex index or count to the output integer type.
pub(crate) fn checked_index<T: TryFrom<usize>>(value: usize, what: &str) -> Result<T> {
    T::try_from(value).map_err(|_| {
        MeshmakerError::encode(format!("{what} {value} does not fit the output index type"))
    })
}
