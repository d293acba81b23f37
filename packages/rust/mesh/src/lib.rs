//! Polygonal surface type and the geometry stages that produce and refine it.
//!
//! Every stage takes a [`PolyData`] by value and returns the next one, so a
//! pipeline can hand meshes along without copying.

pub mod decimate;
pub mod extract;
pub mod polydata;
pub mod quadric;
pub mod smooth;
pub mod strip;
pub mod triangulate;

pub use decimate::decimate;
pub use extract::extract_surface;
pub use polydata::{PolyData, strip_triangles};
pub use smooth::{DEFAULT_RELAXATION, smooth};
pub use strip::strip;
pub use triangulate::triangulate;
