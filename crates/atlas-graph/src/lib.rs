//! Graph layer for the viewer atlas.
//!
//! Builds the weighted channel-overlap graph from aggregated audiences,
//! partitions it into communities (multilevel or greedy agglomerative),
//! and labels each community from its members' metadata.

pub mod builder;
pub mod detector;
pub mod graph;
pub mod greedy;
pub mod louvain;
pub mod partition;
pub mod tagger;

pub use atlas_core as core;
