//! Pipeline orchestration for the viewer atlas.
//!
//! Runs the batch analysis end to end (aggregate, build, detect, tag,
//! export), reading observation sources concurrently and assembling the
//! result bundle that gets written to disk.

pub mod bundle;
pub mod pipeline;

pub use atlas_core as core;
