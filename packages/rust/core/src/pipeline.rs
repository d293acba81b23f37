//! Pipeline execution:
//! decode → extract → [triangulate → smooth → decimate] → strip → write.
//!
//! Each stage takes ownership of the previous stage's output and hands its
//! own output on; nothing is retained once handed off.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use meshmaker_mesh::{DEFAULT_RELAXATION, PolyData};
use meshmaker_shared::{MeshmakerError, Result, StageKind};
use meshmaker_volume::Volume;
use meshmaker_writers::{WriteOptions, WriteReport};

use crate::assembler::{Stage, StagePlan};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The external operations a plan is executed against.
pub trait Collaborators {
    /// Read a density map.
    fn decode(&self, input: &Path) -> Result<Volume>;
    /// Isosurface at `level` as a polygon mesh.
    fn extract(&self, volume: Volume, level: f64) -> Result<PolyData>;
    fn triangulate(&self, mesh: PolyData) -> Result<PolyData>;
    fn smooth(&self, mesh: PolyData, iterations: u32) -> Result<PolyData>;
    /// Topology-preserving decimation.
    fn decimate(&self, mesh: PolyData, target_reduction: f64) -> Result<PolyData>;
    fn strip(&self, mesh: PolyData, max_length: usize) -> Result<PolyData>;
    fn write(&self, mesh: PolyData, path: &Path, options: &WriteOptions) -> Result<WriteReport>;
}

/// Collaborators backed by the meshmaker crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCollaborators;

impl Collaborators for NativeCollaborators {
    fn decode(&self, input: &Path) -> Result<Volume> {
        let volume = meshmaker_volume::read_mrc(input)?;
        if let Some((min, max)) = volume.range() {
            debug!(dims = ?volume.dims(), min, max, mean = volume.mean(), "decoded map");
        }
        Ok(volume)
    }

    fn extract(&self, volume: Volume, level: f64) -> Result<PolyData> {
        let mesh = meshmaker_mesh::extract_surface(&volume, level);
        if mesh.is_empty() {
            warn!(level, "contour level produced an empty surface");
        }
        Ok(mesh)
    }

    fn triangulate(&self, mesh: PolyData) -> Result<PolyData> {
        Ok(meshmaker_mesh::triangulate(mesh))
    }

    fn smooth(&self, mesh: PolyData, iterations: u32) -> Result<PolyData> {
        Ok(meshmaker_mesh::smooth(mesh, iterations, DEFAULT_RELAXATION))
    }

    fn decimate(&self, mesh: PolyData, target_reduction: f64) -> Result<PolyData> {
        meshmaker_mesh::decimate(mesh, target_reduction)
    }

    fn strip(&self, mesh: PolyData, max_length: usize) -> Result<PolyData> {
        Ok(meshmaker_mesh::strip(mesh, max_length))
    }

    fn write(&self, mesh: PolyData, path: &Path, options: &WriteOptions) -> Result<WriteReport> {
        meshmaker_writers::write_mesh(&mesh, path, options)
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Stages executed, in order.
    pub stages: Vec<StageKind>,
    /// Points in the mesh handed to the writer.
    pub points: usize,
    /// Polygons plus strips in the mesh handed to the writer.
    pub cells: usize,
    pub write: WriteReport,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter {
    /// Called when a stage is about to run.
    fn stage(&self, stage: &Stage, index: usize, total: usize);
    /// Called with additional information about the running stage.
    fn note(&self, message: &str);
    /// Called when the pipeline completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for quiet and test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: &Stage, _index: usize, _total: usize) {}
    fn note(&self, _message: &str) {}
    fn done(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// What one stage hands to the next.
enum Handoff {
    Start,
    Volume(Volume),
    Mesh(PolyData),
}

impl Handoff {
    fn into_volume(self) -> Result<Volume> {
        match self {
            Self::Volume(volume) => Ok(volume),
            _ => Err(MeshmakerError::geometry("stage expects a decoded volume")),
        }
    }

    fn into_mesh(self) -> Result<PolyData> {
        match self {
            Self::Mesh(mesh) => Ok(mesh),
            _ => Err(MeshmakerError::geometry("stage expects a mesh")),
        }
    }
}

/// Execute `plan` stage by stage.
///
/// The first failure is returned as [`MeshmakerError::Stage`] naming the
/// stage, and no later stage runs.
#[instrument(skip_all, fields(stages = plan.len()))]
pub fn run(
    plan: &StagePlan,
    collaborators: &dyn Collaborators,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let start = Instant::now();
    let total = plan.len();
    let mut handoff = Handoff::Start;
    let mut executed = Vec::with_capacity(total);
    let mut written = None;

    for (index, stage) in plan.into_iter().enumerate() {
        let kind = stage.kind();
        progress.stage(stage, index + 1, total);
        if let Some(detail) = stage.detail() {
            progress.note(detail);
        }

        let stage_start = Instant::now();
        let current = std::mem::replace(&mut handoff, Handoff::Start);
        handoff = match execute(stage, current, collaborators) {
            Ok(Step::Next(next)) => next,
            Ok(Step::Written { report, points, cells }) => {
                written = Some((report, points, cells));
                Handoff::Start
            }
            Err(e) => {
                warn!(stage = %kind, error = %e, "stage failed");
                return Err(e.in_stage(kind));
            }
        };

        if let Handoff::Mesh(mesh) = &handoff {
            debug!(
                stage = %kind,
                points = mesh.num_points(),
                polys = mesh.num_polys(),
                strips = mesh.num_strips(),
                elapsed_ms = stage_start.elapsed().as_millis(),
                "stage complete"
            );
        }
        executed.push(kind);
    }

    let Some((write, points, cells)) = written else {
        return Err(MeshmakerError::geometry("plan has no write stage").in_stage(StageKind::Write));
    };

    let report = RunReport {
        stages: executed,
        points,
        cells,
        write,
        elapsed: start.elapsed(),
    };
    progress.done(&report);

    info!(
        path = %report.write.path.display(),
        points = report.points,
        cells = report.cells,
        size = report.write.size_bytes,
        elapsed_ms = report.elapsed.as_millis(),
        "pipeline complete"
    );

    Ok(report)
}

enum Step {
    Next(Handoff),
    Written {
        report: WriteReport,
        points: usize,
        cells: usize,
    },
}

fn execute(stage: &Stage, input: Handoff, collaborators: &dyn Collaborators) -> Result<Step> {
    let next = match stage {
        Stage::Decode { input: path } => Handoff::Volume(collaborators.decode(path)?),
        Stage::Extract { level } => {
            Handoff::Mesh(collaborators.extract(input.into_volume()?, *level)?)
        }
        Stage::Triangulate => Handoff::Mesh(collaborators.triangulate(input.into_mesh()?)?),
        Stage::Smooth { iterations } => {
            Handoff::Mesh(collaborators.smooth(input.into_mesh()?, *iterations)?)
        }
        Stage::Decimate { target_reduction } => {
            Handoff::Mesh(collaborators.decimate(input.into_mesh()?, *target_reduction)?)
        }
        Stage::Strip { max_length } => {
            Handoff::Mesh(collaborators.strip(input.into_mesh()?, *max_length)?)
        }
        Stage::Write { path, options } => {
            let mesh = input.into_mesh()?;
            let (points, cells) = (mesh.num_points(), mesh.num_cells());
            let report = collaborators.write(mesh, path, options)?;
            return Ok(Step::Written {
                report,
                points,
                cells,
            });
        }
    };
    Ok(Step::Next(next))
}
