use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::interner::ViewerInterner;

/// Where a presence observation was captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Captured from a live chatter roster.
    #[default]
    Live,
    /// Reconstructed from recorded (VOD) chat, bucketed into time windows.
    Vod,
}

impl SourceKind {
    /// Stable lowercase name, used as a map key in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Live => "live",
            SourceKind::Vod => "vod",
        }
    }

    /// Parses a source tag; unknown tags return `None` so callers can
    /// fall back to the source's default kind.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "live" => Some(SourceKind::Live),
            "vod" => Some(SourceKind::Vod),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single "viewer was present in channel" record, the atomic input of
/// the whole pipeline. Identifiers are lowercased on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceObservation {
    /// Channel the viewer was observed in.
    #[serde(alias = "channel_login")]
    pub channel: String,
    /// Viewer (chatter) identifier.
    #[serde(alias = "chatter")]
    pub viewer: String,
    /// Capture source for this observation.
    #[serde(default, alias = "_source")]
    pub source: SourceKind,
    /// UTC capture time, when the source recorded one.
    #[serde(default, alias = "timestamp")]
    pub observed_at: Option<DateTime<Utc>>,
    /// Time-bucket index for bucketed (VOD) captures.
    #[serde(default, alias = "window", alias = "bucket_id")]
    pub window_id: Option<u64>,
}

impl PresenceObservation {
    /// Builds an observation, lowercasing both identifiers.
    pub fn new(channel: &str, viewer: &str, source: SourceKind) -> Self {
        Self {
            channel: channel.trim().to_lowercase(),
            viewer: viewer.trim().to_lowercase(),
            source,
            observed_at: None,
            window_id: None,
        }
    }

    /// An observation missing either identifier carries no signal.
    pub fn is_valid(&self) -> bool {
        !self.channel.is_empty() && !self.viewer.is_empty()
    }
}

/// Descriptive channel attributes carried alongside the viewer set.
///
/// One record per channel; conflicting records are resolved by recency
/// and then by configured source priority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    /// Stream category (game name) as reported by the platform.
    #[serde(default)]
    pub category: Option<String>,
    /// Broadcast language code (e.g. "en", "pt").
    #[serde(default)]
    pub language: Option<String>,
    /// Stream title at capture time.
    #[serde(default)]
    pub title: Option<String>,
    /// Concurrent viewer count reported by the platform, not the number
    /// of distinct chatters.
    #[serde(default)]
    pub viewer_count: u64,
    /// When this metadata snapshot was captured.
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
    /// Which source produced the winning snapshot.
    #[serde(default)]
    pub source: SourceKind,
}

impl ChannelMetadata {
    /// True when `self` should be replaced by `candidate` under the
    /// recency-then-priority rule. A present timestamp always beats a
    /// missing one; equal timestamps defer to `priority` order (earlier
    /// entries win).
    pub fn loses_to(&self, candidate: &ChannelMetadata, priority: &[SourceKind]) -> bool {
        match (self.observed_at, candidate.observed_at) {
            (Some(current), Some(new)) if new != current => new > current,
            (None, Some(_)) => true,
            (Some(_), None) => false,
            _ => {
                let rank = |kind: SourceKind| {
                    priority
                        .iter()
                        .position(|p| *p == kind)
                        .unwrap_or(priority.len())
                };
                rank(candidate.source) < rank(self.source)
            }
        }
    }
}

/// Distinct audience and metadata for one channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelAudience {
    /// Interned ids of every distinct viewer seen in this channel.
    pub viewers: HashSet<u32>,
    /// Winning metadata snapshot for this channel.
    pub metadata: ChannelMetadata,
}

impl ChannelAudience {
    /// Number of distinct viewers observed in this channel.
    pub fn audience_size(&self) -> usize {
        self.viewers.len()
    }
}

/// The aggregation output: every observed channel mapped to its distinct
/// audience, plus the interner that owns viewer-name storage.
///
/// Channels are kept in a `BTreeMap` so every downstream consumer sees
/// the same channel order and assigns the same dense ids.
#[derive(Debug, Clone, Default)]
pub struct ChannelViewerSet {
    /// Channel name (lowercase) to audience mapping.
    pub channels: BTreeMap<String, ChannelAudience>,
    /// Shared viewer-name interner; ids are dense u32s.
    pub viewers: ViewerInterner,
}

impl ChannelViewerSet {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Distinct viewers across the retained channels. Computed from the
    /// channel sets, not the interner, so post-filter counts are exact.
    pub fn distinct_viewer_count(&self) -> usize {
        let mut seen: HashSet<u32> = HashSet::new();
        for audience in self.channels.values() {
            seen.extend(audience.viewers.iter().copied());
        }
        seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Aggregation-quality summary reported alongside every analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Channels retained after pre-filters.
    pub channel_count: usize,
    /// Distinct viewers across retained channels.
    pub distinct_viewer_count: usize,
    /// Raw observations ingested (before dedup).
    pub observation_count: u64,
    /// Records skipped because they could not be parsed.
    pub malformed_records: u64,
    /// Observation counts per capture source.
    pub source_counts: BTreeMap<String, u64>,
    /// Mean distinct-audience size per channel.
    pub avg_audience_per_channel: f64,
    /// Median distinct-audience size per channel.
    pub median_audience_per_channel: f64,
    /// Largest single-channel audience.
    pub max_audience: usize,
    /// Smallest single-channel audience.
    pub min_audience: usize,
    /// Mean number of channels each viewer appears in.
    pub avg_channels_per_viewer: f64,
    /// Viewers appearing in at least two channels.
    pub repeat_viewers_2plus: usize,
    /// Viewers appearing in at least three channels.
    pub repeat_viewers_3plus: usize,
    /// Viewers appearing in exactly one channel.
    pub one_off_viewers: usize,
    /// Share of viewers appearing in exactly one channel, 0-100.
    pub one_off_percentage: f64,
}

/// Optional UTC bounds applied to `observed_at` during aggregation.
/// Observations without a timestamp always pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Window covering the trailing `hours` hours ending now.
    pub fn last_hours(hours: u64) -> Self {
        Self {
            since: Some(Utc::now() - chrono::Duration::hours(hours as i64)),
            until: None,
        }
    }

    pub fn contains(&self, instant: Option<DateTime<Utc>>) -> bool {
        let Some(t) = instant else { return true };
        if let Some(since) = self.since {
            if t < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if t > until {
                return false;
            }
        }
        true
    }
}

/// Parses capture timestamps leniently. Accepts RFC 3339 (with or
/// without a trailing `Z`), a plain `YYYY-MM-DD HH:MM:SS`, and the
/// compact `YYYYMMDD_HHMMSS` form used in snapshot file names.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    // RFC 3339 requires an offset; bare ISO timestamps get UTC assumed.
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y%m%d_%H%M%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    None
}
