//! Analysis configuration: the full parameter surface of a pipeline run,
//! preset bundles, and fail-fast validation. Validation runs before any
//! data is touched; a bad value never reaches the algorithms.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{AtlasError, Result};
use crate::models::SourceKind;

/// Community detection strategy selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Multilevel modularity optimization (the default).
    #[default]
    Louvain,
    /// Greedy agglomerative merging, kept as a fallback strategy.
    Greedy,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Louvain => "louvain",
            StrategyKind::Greedy => "greedy",
        }
    }
}

/// Named configuration bundles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PresetKind {
    /// Lenient thresholds for a first look at fresh data.
    #[default]
    Default,
    /// Atlas-style parameters: only strong overlaps, sizeable communities.
    Rigorous,
    /// Low thresholds and high resolution to surface fine structure.
    Exploratory,
    /// Tiny thresholds plus DEBUG logging.
    Debug,
}

impl PresetKind {
    /// Base configuration for this preset; flags and files override it.
    pub fn base_config(&self) -> AnalysisConfig {
        match self {
            PresetKind::Default => AnalysisConfig::default(),
            PresetKind::Rigorous => AnalysisConfig {
                min_channel_viewers: 10,
                overlap_threshold: 300,
                min_community_size: 10,
                ..AnalysisConfig::default()
            },
            PresetKind::Exploratory => AnalysisConfig {
                resolution: 2.0,
                overlap_threshold: 1,
                min_channel_viewers: 1,
                min_community_size: 1,
                ..AnalysisConfig::default()
            },
            PresetKind::Debug => AnalysisConfig {
                overlap_threshold: 1,
                min_channel_viewers: 1,
                ..AnalysisConfig::default()
            },
        }
    }

    /// Log level implied by the preset when none is given explicitly.
    pub fn log_level(&self) -> &'static str {
        match self {
            PresetKind::Default | PresetKind::Rigorous => "INFO",
            PresetKind::Exploratory | PresetKind::Debug => "DEBUG",
        }
    }
}

/// Every tunable of an analysis run. Serializable so the result bundle
/// can embed the exact configuration that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum shared-viewer count for an edge to materialize.
    pub overlap_threshold: u64,
    /// Louvain resolution parameter; higher values favor smaller
    /// communities. Must be positive and finite.
    pub resolution: f64,
    /// Reporting floor for community size. Post-hoc only: the partition
    /// itself always stays total.
    pub min_community_size: usize,
    /// Weighted share the top category needs to become the label.
    pub game_threshold: f64,
    /// Weighted share the top language needs for a parenthetical tag.
    pub language_threshold: f64,
    /// Channels with a smaller distinct audience are dropped before the
    /// graph is built. Zero disables the filter.
    pub min_channel_viewers: u64,
    /// Keep only viewers present in at least this many channels. One
    /// keeps everyone.
    pub min_viewer_appearances: u64,
    /// Which detection strategy to run.
    pub strategy: StrategyKind,
    /// Upper bound on local-move passes per level before the run is
    /// declared non-converged.
    pub max_move_passes: u32,
    /// Metadata tie-breaking order; earlier sources win.
    pub source_priority: Vec<SourceKind>,
    /// Maximum observation sources read in parallel.
    pub read_concurrency: usize,
    /// Deadline for the whole source-read phase, in seconds. On expiry
    /// the run continues with whatever arrived.
    pub source_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: 1,
            resolution: 1.0,
            min_community_size: 1,
            game_threshold: 0.60,
            language_threshold: 0.40,
            min_channel_viewers: 0,
            min_viewer_appearances: 1,
            strategy: StrategyKind::Louvain,
            max_move_passes: 100,
            source_priority: vec![SourceKind::Live, SourceKind::Vod],
            read_concurrency: 4,
            source_timeout_secs: 30,
        }
    }
}

impl AnalysisConfig {
    /// Rejects invalid parameter combinations before any computation.
    pub fn validate(&self) -> Result<()> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(AtlasError::Config(format!(
                "resolution must be positive and finite, got {}",
                self.resolution
            )));
        }
        if !(0.0..=1.0).contains(&self.game_threshold) {
            return Err(AtlasError::Config(format!(
                "game_threshold must be within 0..=1, got {}",
                self.game_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.language_threshold) {
            return Err(AtlasError::Config(format!(
                "language_threshold must be within 0..=1, got {}",
                self.language_threshold
            )));
        }
        if self.min_viewer_appearances < 1 {
            return Err(AtlasError::Config(
                "min_viewer_appearances must be at least 1".to_string(),
            ));
        }
        if self.max_move_passes < 1 {
            return Err(AtlasError::Config(
                "max_move_passes must be at least 1".to_string(),
            ));
        }
        if self.read_concurrency < 1 {
            return Err(AtlasError::Config(
                "read_concurrency must be at least 1".to_string(),
            ));
        }
        if self.source_priority.is_empty() {
            return Err(AtlasError::Config(
                "source_priority must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads a configuration from a JSON file. Unspecified fields take
    /// their defaults; parse failures surface immediately.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| AtlasError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AnalysisConfig = serde_json::from_str(&content)?;
        debug!("Loaded analysis config from {}", path.display());
        Ok(config)
    }
}
