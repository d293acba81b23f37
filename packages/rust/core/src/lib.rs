//! Pipeline assembly and execution for meshmaker.
//!
//! [`assemble`] turns a validated [`Configuration`](meshmaker_shared::Configuration)
//! into an ordered [`StagePlan`]; [`run`] executes it against a set of
//! [`Collaborators`], handing each stage's output to the next.

pub mod assembler;
pub mod pipeline;

pub use assembler::{MAX_STRIP_LENGTH, Stage, StagePlan, assemble};
pub use pipeline::{
    Collaborators, NativeCollaborators, ProgressReporter, RunReport, SilentProgress, run,
};
