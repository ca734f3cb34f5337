//! Ingestion layer for the viewer atlas.
//!
//! Responsible for discovering and parsing presence-observation files
//! (record streams, snapshot documents, columnar batches, CSV rows) and
//! for merging them into the channel-to-audience mapping the graph
//! builder consumes.

pub mod aggregator;
pub mod reader;

pub use atlas_core as core;
