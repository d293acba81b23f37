//! Error types for meshmaker.
//!
//! Library crates use [`MeshmakerError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::{OutputFormat, StageKind};

// ---------------------------------------------------------------------------
// Configuration-time errors
// ---------------------------------------------------------------------------

/// A single problem found while scanning option tokens.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigIssue {
    /// A value flag was followed by text that is not a number.
    #[error("invalid value for {flag}: '{value}' is not a valid number")]
    Parse { flag: String, value: String },

    /// A value flag was the last token, so it has no value at all.
    #[error("missing value for {flag}")]
    MissingValue { flag: String },

    /// No positional token named the input map.
    #[error("Input MAP/MRC file not specified")]
    MissingInput,

    /// Decimation was requested with a target reduction outside (0, 1).
    #[error("Target reduction out of range (0, 1): {value}")]
    Range { value: f64 },
}

impl ConfigIssue {
    /// True for malformed option values (`Parse` and `MissingValue`).
    pub const fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::MissingValue { .. })
    }
}

/// Every issue found in one build attempt, reported together.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid configuration: {}", render_issues(.issues))]
pub struct ConfigurationError {
    pub issues: Vec<ConfigIssue>,
}

fn render_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Non-fatal inconsistency in an otherwise valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigWarning {
    /// `--uint64` only affects the XML VTP writer.
    #[error("header set to UInt64 with non-vtp output format ({format})")]
    WideHeaderWithoutVtp { format: OutputFormat },
}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Top-level error type for all meshmaker operations.
#[derive(Debug, thiserror::Error)]
pub enum MeshmakerError {
    /// Defaults file loading or parsing error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A collaborator failed while running a pipeline stage.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: StageKind,
        source: Box<MeshmakerError>,
    },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Density map could not be decoded.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// Mesh processing rejected its input.
    #[error("geometry error: {message}")]
    Geometry { message: String },

    /// Mesh could not be encoded in the requested format.
    #[error("encode error: {message}")]
    Encode { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MeshmakerError>;

impl MeshmakerError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a decode error from any displayable message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    /// Create a geometry error from any displayable message.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry {
            message: msg.into(),
        }
    }

    /// Create an encode error from any displayable message.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attribute this error to a pipeline stage.
    pub fn in_stage(self, stage: StageKind) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The stage this error was raised in, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
