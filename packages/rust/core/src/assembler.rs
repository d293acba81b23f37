//! Pipeline assembler.
//!
//! Turns a validated [`Configuration`] into the ordered list of stages that
//! produce and write the mesh. The chain always starts with
//! `Decode -> Extract` and ends with `Strip -> Write`; triangulation,
//! smoothing and decimation are inserted between them only when smoothing or
//! decimation is requested, and smoothing always runs before decimation.

use std::fmt;
use std::path::PathBuf;

use meshmaker_shared::{Configuration, OutputFormat, StageKind};
use meshmaker_writers::{Encoding, HeaderWidth, IndexWidth, WriteOptions};
use tracing::debug;

/// Maximum number of triangles per generated strip.
pub const MAX_STRIP_LENGTH: usize = 1000;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One step of the chain, carrying the parameters its collaborator needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Decode { input: PathBuf },
    Extract { level: f64 },
    Triangulate,
    /// Negative requested counts are clamped to zero here.
    Smooth { iterations: u32 },
    /// Decimation always preserves topology.
    Decimate { target_reduction: f64 },
    Strip { max_length: usize },
    Write { path: PathBuf, options: WriteOptions },
}

impl Stage {
    pub const fn kind(&self) -> StageKind {
        match self {
            Self::Decode { .. } => StageKind::Decode,
            Self::Extract { .. } => StageKind::Extract,
            Self::Triangulate => StageKind::Triangulate,
            Self::Smooth { .. } => StageKind::Smooth,
            Self::Decimate { .. } => StageKind::Decimate,
            Self::Strip { .. } => StageKind::Strip,
            Self::Write { .. } => StageKind::Write,
        }
    }

    /// Extra verbose line announced after the stage message, if any.
    pub fn detail(&self) -> Option<&'static str> {
        match self {
            Self::Write { options, .. } if options.format == OutputFormat::XmlVtp => {
                Some(match options.header_width {
                    HeaderWidth::UInt64 => "Using UInt64 headers...",
                    HeaderWidth::UInt32 => "Using UInt32 headers...",
                })
            }
            _ => None,
        }
    }
}

/// The message shown in verbose mode when the stage starts.
impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode { input } => write!(f, "Reading MRC/MAP file...{}", input.display()),
            Self::Extract { level } => write!(f, "Running contour filter at level {level}..."),
            Self::Triangulate => f.write_str("Running triangle filter..."),
            Self::Smooth { iterations } => {
                write!(f, "Running smoothing filter with {iterations} iterations...")
            }
            Self::Decimate { target_reduction } => write!(
                f,
                "Running progressive decimation filter with {target_reduction} target reduction..."
            ),
            Self::Strip { .. } => f.write_str("Generating triangle strips..."),
            Self::Write { path, .. } => write!(f, "Writing output to '{}'...", path.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// StagePlan
// ---------------------------------------------------------------------------

/// Ordered, validated stage chain. Only [`assemble`] builds one.
#[derive(Debug, Clone, PartialEq)]
pub struct StagePlan {
    stages: Vec<Stage>,
}

impl StagePlan {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Stage kinds in execution order.
    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(Stage::kind).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl<'a> IntoIterator for &'a StagePlan {
    type Item = &'a Stage;
    type IntoIter = std::slice::Iter<'a, Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.iter()
    }
}

/// Build the stage chain for `config`.
pub fn assemble(config: &Configuration) -> StagePlan {
    let mut stages = vec![
        Stage::Decode {
            input: config.input_path().to_path_buf(),
        },
        Stage::Extract {
            level: config.contour_level(),
        },
    ];

    if config.decimate_enabled() || config.smooth_enabled() {
        stages.push(Stage::Triangulate);
        if config.smooth_enabled() {
            stages.push(Stage::Smooth {
                iterations: u32::try_from(config.smooth_iterations()).unwrap_or(0),
            });
        }
        if config.decimate_enabled() {
            stages.push(Stage::Decimate {
                target_reduction: config.target_reduction(),
            });
        }
    }

    stages.push(Stage::Strip {
        max_length: MAX_STRIP_LENGTH,
    });
    stages.push(Stage::Write {
        path: config.output_path().to_path_buf(),
        options: write_options(config),
    });

    let plan = StagePlan { stages };
    debug!(stages = ?plan.kinds(), "assembled pipeline");
    plan
}

/// Header and index widths only apply to VTP; other formats keep defaults.
fn write_options(config: &Configuration) -> WriteOptions {
    let format = config.output_format();
    let encoding = if config.ascii() {
        Encoding::Ascii
    } else {
        Encoding::Binary
    };

    if format != OutputFormat::XmlVtp {
        return WriteOptions {
            format,
            encoding,
            ..WriteOptions::default()
        };
    }

    WriteOptions {
        format,
        encoding,
        header_width: if config.wide_headers() {
            HeaderWidth::UInt64
        } else {
            HeaderWidth::UInt32
        },
        index_width: if config.narrow_indices() {
            IndexWidth::Int32
        } else {
            IndexWidth::Int64
        },
    }
}
