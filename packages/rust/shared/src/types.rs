//! Core domain types shared by every meshmaker crate.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// Mesh file format written at the end of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Stereolithography (`.stl`).
    #[serde(rename = "stl")]
    Stl,
    /// Legacy VTK polydata (`.vtk`).
    #[serde(rename = "vtk")]
    LegacyVtk,
    /// VTK XML polydata (`.vtp`).
    #[default]
    #[serde(rename = "vtp")]
    XmlVtp,
}

impl OutputFormat {
    /// File extension (without the dot) used to derive the output path.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Stl => "stl",
            Self::LegacyVtk => "vtk",
            Self::XmlVtp => "vtp",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "stl" => Ok(Self::Stl),
            "vtk" => Ok(Self::LegacyVtk),
            "vtp" => Ok(Self::XmlVtp),
            other => Err(format!("unknown output format '{other}' (expected stl, vtk or vtp)")),
        }
    }
}

// ---------------------------------------------------------------------------
// StageKind
// ---------------------------------------------------------------------------

/// One discrete step of the processing chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Decode,
    Extract,
    Triangulate,
    Smooth,
    Decimate,
    Strip,
    Write,
}

impl StageKind {
    /// Lower-case stage name used in logs and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Extract => "extract",
            Self::Triangulate => "triangulate",
            Self::Smooth => "smooth",
            Self::Decimate => "decimate",
            Self::Strip => "strip",
            Self::Write => "write",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
