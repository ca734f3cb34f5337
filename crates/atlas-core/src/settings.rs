use clap::Parser;
use std::path::PathBuf;

use crate::config::{AnalysisConfig, PresetKind, StrategyKind};
use crate::error::Result;
use crate::models::TimeWindow;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Viewer-overlap community analysis for streaming channels
#[derive(Parser, Debug, Clone)]
#[command(
    name = "viewer-atlas",
    about = "Viewer-overlap community analysis for streaming channels",
    version
)]
pub struct Settings {
    /// Directory containing observation files (discovered recursively)
    #[arg(long, env = "ATLAS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Additional directory of VOD chatter observations
    #[arg(long, env = "ATLAS_VOD_DIR")]
    pub vod_dir: Option<PathBuf>,

    /// Output directory for the analysis bundle and graph tables
    #[arg(long, default_value = "community_analysis")]
    pub out_dir: PathBuf,

    /// Configuration preset to start from
    #[arg(long, value_enum, default_value_t = PresetKind::Default)]
    pub preset: PresetKind,

    /// JSON configuration file; replaces the preset as the base
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Community detection strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyKind>,

    /// Minimum shared viewers for an edge
    #[arg(long, env = "OVERLAP_THRESHOLD")]
    pub overlap_threshold: Option<u64>,

    /// Modularity resolution parameter
    #[arg(long, env = "RESOLUTION")]
    pub resolution: Option<f64>,

    /// Community size reporting floor
    #[arg(long, env = "MIN_COMMUNITY_SIZE")]
    pub min_community_size: Option<usize>,

    /// Weighted share required for a category label (0-1)
    #[arg(long)]
    pub game_threshold: Option<f64>,

    /// Weighted share required for a language tag (0-1)
    #[arg(long)]
    pub language_threshold: Option<f64>,

    /// Drop channels with fewer distinct viewers than this
    #[arg(long)]
    pub min_channel_viewers: Option<u64>,

    /// Keep only viewers seen in at least this many channels
    #[arg(long)]
    pub min_viewer_appearances: Option<u64>,

    /// Restrict aggregation to observations from the last N hours
    #[arg(long)]
    pub hours_back: Option<u64>,

    /// Logging level (defaults to the preset's level)
    #[arg(long, env = "LOG_LEVEL", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: Option<String>,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Only log warnings and errors, and skip the final summary
    #[arg(long, conflicts_with = "debug")]
    pub quiet: bool,
}

impl Settings {
    /// Resolves the effective analysis configuration: the preset (or the
    /// `--config` file when given) forms the base, explicit flags and
    /// environment values override individual fields, and the result is
    /// validated before it is returned.
    pub fn to_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load_from(path)?,
            None => self.preset.base_config(),
        };

        if let Some(v) = self.overlap_threshold {
            config.overlap_threshold = v;
        }
        if let Some(v) = self.resolution {
            config.resolution = v;
        }
        if let Some(v) = self.min_community_size {
            config.min_community_size = v;
        }
        if let Some(v) = self.game_threshold {
            config.game_threshold = v;
        }
        if let Some(v) = self.language_threshold {
            config.language_threshold = v;
        }
        if let Some(v) = self.min_channel_viewers {
            config.min_channel_viewers = v;
        }
        if let Some(v) = self.min_viewer_appearances {
            config.min_viewer_appearances = v;
        }
        if let Some(v) = self.strategy {
            config.strategy = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Effective log level: `--debug` wins, then `--quiet`, then an
    /// explicit level, then the preset's implied level.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            return "DEBUG";
        }
        if self.quiet {
            return "WARNING";
        }
        match &self.log_level {
            Some(level) => level,
            None => self.preset.log_level(),
        }
    }

    /// Aggregation window implied by `--hours-back`, when given.
    pub fn time_window(&self) -> Option<TimeWindow> {
        self.hours_back.map(TimeWindow::last_hours)
    }
}
