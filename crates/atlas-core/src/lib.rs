//! Core domain layer for the viewer atlas.
//!
//! Defines the presence-observation data model, the channel/viewer
//! aggregate types shared by every pipeline stage, the analysis
//! configuration surface, and the crate-wide error type.

pub mod config;
pub mod error;
pub mod interner;
pub mod models;
pub mod settings;

pub use config::{AnalysisConfig, PresetKind, StrategyKind};
pub use error::{AtlasError, Result};
pub use interner::ViewerInterner;
pub use models::{
    ChannelAudience, ChannelMetadata, ChannelViewerSet, PresenceObservation, QualityReport,
    SourceKind, TimeWindow,
};
