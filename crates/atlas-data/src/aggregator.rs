//! Presence aggregation: merges heterogeneous observation batches into
//! one channel-to-audience mapping with resolved metadata, applies the
//! configured pre-filters, and reports data quality.

use std::collections::{BTreeMap, HashMap, HashSet};

use atlas_core::config::AnalysisConfig;
use atlas_core::interner::ViewerInterner;
use atlas_core::models::{
    ChannelAudience, ChannelMetadata, ChannelViewerSet, PresenceObservation, QualityReport,
    SourceKind, TimeWindow,
};
use tracing::debug;

use crate::reader::{read_source, ObservationBatch, ObservationSource};

// ── PresenceAggregator ────────────────────────────────────────────────────────

/// Accumulates observations and metadata candidates across any number of
/// batches. `(channel, viewer)` pairs deduplicate by construction: the
/// audience is a set of interned viewer ids.
#[derive(Debug, Default)]
pub struct PresenceAggregator {
    audiences: BTreeMap<String, HashSet<u32>>,
    metadata: BTreeMap<String, ChannelMetadata>,
    viewers: ViewerInterner,
    observation_count: u64,
    malformed_records: u64,
    window_filtered: u64,
    source_counts: BTreeMap<String, u64>,
    source_priority: Vec<SourceKind>,
    window: Option<TimeWindow>,
}

impl PresenceAggregator {
    pub fn new(source_priority: Vec<SourceKind>, window: Option<TimeWindow>) -> Self {
        Self {
            source_priority,
            window,
            ..Default::default()
        }
    }

    /// Add one observation. Observations outside the aggregation window
    /// are dropped; repeats of an already-seen `(channel, viewer)` pair
    /// only bump the raw counter.
    pub fn ingest(&mut self, obs: &PresenceObservation) {
        if !obs.is_valid() {
            self.malformed_records += 1;
            return;
        }
        if let Some(window) = &self.window {
            if !window.contains(obs.observed_at) {
                self.window_filtered += 1;
                return;
            }
        }

        self.observation_count += 1;
        *self
            .source_counts
            .entry(obs.source.as_str().to_string())
            .or_insert(0) += 1;

        let viewer = self.viewers.intern(&obs.viewer);
        self.audiences
            .entry(obs.channel.clone())
            .or_default()
            .insert(viewer);
    }

    /// Offer a metadata candidate for `channel`. The first candidate is
    /// taken as-is; later ones win only under the recency-then-priority
    /// rule. Registers the channel even when no chatters were seen.
    pub fn ingest_metadata(&mut self, channel: &str, candidate: ChannelMetadata) {
        let channel = channel.trim().to_lowercase();
        if channel.is_empty() {
            self.malformed_records += 1;
            return;
        }
        self.audiences.entry(channel.clone()).or_default();

        match self.metadata.get_mut(&channel) {
            None => {
                self.metadata.insert(channel, candidate);
            }
            Some(current) => {
                if current.loses_to(&candidate, &self.source_priority) {
                    *current = candidate;
                }
            }
        }
    }

    /// Fold a whole reader batch into the aggregate.
    pub fn ingest_batch(&mut self, batch: ObservationBatch) {
        for obs in &batch.observations {
            self.ingest(obs);
        }
        for (channel, candidate) in batch.metadata {
            self.ingest_metadata(&channel, candidate);
        }
        self.malformed_records += batch.malformed;
    }

    /// Apply the configured pre-filters and produce the final mapping
    /// plus its quality report.
    pub fn finish(mut self, config: &AnalysisConfig) -> (ChannelViewerSet, QualityReport) {
        if config.min_channel_viewers > 0 {
            let before = self.audiences.len();
            self.audiences
                .retain(|_, viewers| viewers.len() as u64 >= config.min_channel_viewers);
            debug!(
                "Channel size filter (min {}): {} -> {} channels",
                config.min_channel_viewers,
                before,
                self.audiences.len()
            );
        }

        if config.min_viewer_appearances > 1 {
            self.retain_repeat_viewers(config.min_viewer_appearances);
        }

        if self.window_filtered > 0 {
            debug!(
                "{} observations fell outside the aggregation window",
                self.window_filtered
            );
        }

        let report = self.build_report();
        let channels: BTreeMap<String, ChannelAudience> = self
            .audiences
            .into_iter()
            .map(|(channel, viewers)| {
                let metadata = self.metadata.remove(&channel).unwrap_or_default();
                (channel, ChannelAudience { viewers, metadata })
            })
            .collect();

        (
            ChannelViewerSet {
                channels,
                viewers: self.viewers,
            },
            report,
        )
    }

    /// Keep only viewers present in at least `min_appearances` channels;
    /// channels left with no qualifying viewer are dropped.
    fn retain_repeat_viewers(&mut self, min_appearances: u64) {
        let counts = self.appearance_counts();
        let keep: HashSet<u32> = counts
            .into_iter()
            .filter(|(_, n)| *n >= min_appearances)
            .map(|(viewer, _)| viewer)
            .collect();

        let before = self.audiences.len();
        for viewers in self.audiences.values_mut() {
            viewers.retain(|v| keep.contains(v));
        }
        self.audiences.retain(|_, viewers| !viewers.is_empty());
        debug!(
            "Repeat-viewer filter (min {}): {} -> {} channels",
            min_appearances,
            before,
            self.audiences.len()
        );
    }

    /// How many channels each viewer currently appears in.
    fn appearance_counts(&self) -> HashMap<u32, u64> {
        let mut counts: HashMap<u32, u64> = HashMap::new();
        for viewers in self.audiences.values() {
            for viewer in viewers {
                *counts.entry(*viewer).or_insert(0) += 1;
            }
        }
        counts
    }

    fn build_report(&self) -> QualityReport {
        let mut audience_sizes: Vec<usize> =
            self.audiences.values().map(|v| v.len()).collect();
        audience_sizes.sort_unstable();

        let counts = self.appearance_counts();
        let distinct = counts.len();
        let one_off = counts.values().filter(|&&n| n == 1).count();
        let repeat2 = counts.values().filter(|&&n| n >= 2).count();
        let repeat3 = counts.values().filter(|&&n| n >= 3).count();
        let total_memberships: u64 = counts.values().sum();

        QualityReport {
            channel_count: self.audiences.len(),
            distinct_viewer_count: distinct,
            observation_count: self.observation_count,
            malformed_records: self.malformed_records,
            source_counts: self.source_counts.clone(),
            avg_audience_per_channel: mean(&audience_sizes),
            median_audience_per_channel: median(&audience_sizes),
            max_audience: audience_sizes.last().copied().unwrap_or(0),
            min_audience: audience_sizes.first().copied().unwrap_or(0),
            avg_channels_per_viewer: if distinct == 0 {
                0.0
            } else {
                total_memberships as f64 / distinct as f64
            },
            repeat_viewers_2plus: repeat2,
            repeat_viewers_3plus: repeat3,
            one_off_viewers: one_off,
            one_off_percentage: if distinct == 0 {
                0.0
            } else {
                one_off as f64 / distinct as f64 * 100.0
            },
        }
    }
}

/// Mean of a sorted slice of sizes; 0.0 when empty.
fn mean(sorted: &[usize]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.iter().sum::<usize>() as f64 / sorted.len() as f64
}

/// Median of a sorted slice of sizes; 0.0 when empty.
fn median(sorted: &[usize]) -> f64 {
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 1 => sorted[n / 2] as f64,
        n => (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0,
    }
}

// ── Sequential front door ─────────────────────────────────────────────────────

/// Read every source in order and aggregate the results. The concurrent
/// variant in the runtime crate produces the same outcome; this one is
/// the deterministic reference used directly by tests and small runs.
pub fn aggregate(
    sources: &[ObservationSource],
    window: Option<TimeWindow>,
    config: &AnalysisConfig,
) -> (ChannelViewerSet, QualityReport) {
    let mut aggregator = PresenceAggregator::new(config.source_priority.clone(), window);
    for source in sources {
        aggregator.ingest_batch(read_source(source));
    }
    aggregator.finish(config)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::models::parse_timestamp;
    use std::io::Write;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn make_aggregator() -> PresenceAggregator {
        PresenceAggregator::new(vec![SourceKind::Live, SourceKind::Vod], None)
    }

    fn obs(channel: &str, viewer: &str) -> PresenceObservation {
        PresenceObservation::new(channel, viewer, SourceKind::Live)
    }

    fn obs_at(channel: &str, viewer: &str, ts: &str) -> PresenceObservation {
        let mut o = obs(channel, viewer);
        o.observed_at = parse_timestamp(ts);
        o
    }

    fn meta(category: &str, ts: Option<&str>, source: SourceKind) -> ChannelMetadata {
        ChannelMetadata {
            category: Some(category.to_string()),
            observed_at: ts.and_then(parse_timestamp),
            source,
            ..Default::default()
        }
    }

    fn finish_default(aggregator: PresenceAggregator) -> (ChannelViewerSet, QualityReport) {
        aggregator.finish(&AnalysisConfig::default())
    }

    // ── Dedup and lowercasing ─────────────────────────────────────────────────

    #[test]
    fn test_repeated_pairs_count_once() {
        let mut aggregator = make_aggregator();
        aggregator.ingest(&obs("xqc", "alice"));
        aggregator.ingest(&obs("xqc", "alice"));
        aggregator.ingest(&obs("XQC", "ALICE"));

        let (set, report) = finish_default(aggregator);
        assert_eq!(set.channels["xqc"].audience_size(), 1);
        // Raw ingest counter still sees every observation.
        assert_eq!(report.observation_count, 3);
        assert_eq!(report.distinct_viewer_count, 1);
    }

    #[test]
    fn test_viewer_identity_spans_channels() {
        let mut aggregator = make_aggregator();
        aggregator.ingest(&obs("a", "alice"));
        aggregator.ingest(&obs("b", "alice"));
        aggregator.ingest(&obs("b", "bob"));

        let (set, report) = finish_default(aggregator);
        let id = set.viewers.get("alice").expect("interned");
        assert!(set.channels["a"].viewers.contains(&id));
        assert!(set.channels["b"].viewers.contains(&id));
        assert_eq!(report.distinct_viewer_count, 2);
    }

    #[test]
    fn test_invalid_observation_is_malformed() {
        let mut aggregator = make_aggregator();
        aggregator.ingest(&obs("xqc", ""));
        let (set, report) = finish_default(aggregator);
        assert!(set.is_empty());
        assert_eq!(report.malformed_records, 1);
        assert_eq!(report.observation_count, 0);
    }

    // ── Metadata resolution ───────────────────────────────────────────────────

    #[test]
    fn test_first_metadata_candidate_is_taken() {
        let mut aggregator = make_aggregator();
        aggregator.ingest_metadata("xqc", meta("Dota 2", None, SourceKind::Vod));
        let (set, _) = finish_default(aggregator);
        assert_eq!(
            set.channels["xqc"].metadata.category.as_deref(),
            Some("Dota 2")
        );
    }

    #[test]
    fn test_more_recent_metadata_wins() {
        let mut aggregator = make_aggregator();
        aggregator.ingest_metadata(
            "xqc",
            meta("Dota 2", Some("2025-01-01T10:00:00Z"), SourceKind::Live),
        );
        aggregator.ingest_metadata(
            "xqc",
            meta("Chess", Some("2025-01-01T12:00:00Z"), SourceKind::Vod),
        );
        aggregator.ingest_metadata(
            "xqc",
            meta("Valorant", Some("2025-01-01T09:00:00Z"), SourceKind::Live),
        );

        let (set, _) = finish_default(aggregator);
        assert_eq!(
            set.channels["xqc"].metadata.category.as_deref(),
            Some("Chess")
        );
    }

    #[test]
    fn test_metadata_tie_defers_to_source_priority() {
        let ts = Some("2025-01-01T10:00:00Z");
        let mut aggregator = make_aggregator();
        aggregator.ingest_metadata("xqc", meta("FromVod", ts, SourceKind::Vod));
        aggregator.ingest_metadata("xqc", meta("FromLive", ts, SourceKind::Live));
        // A second vod candidate at the same instant must not displace live.
        aggregator.ingest_metadata("xqc", meta("FromVodAgain", ts, SourceKind::Vod));

        let (set, _) = finish_default(aggregator);
        assert_eq!(
            set.channels["xqc"].metadata.category.as_deref(),
            Some("FromLive")
        );
    }

    #[test]
    fn test_metadata_only_channel_registers_empty_audience() {
        let mut aggregator = make_aggregator();
        aggregator.ingest_metadata("quiet", meta("Chess", None, SourceKind::Live));
        let (set, report) = finish_default(aggregator);
        assert_eq!(set.channel_count(), 1);
        assert_eq!(set.channels["quiet"].audience_size(), 0);
        assert_eq!(report.min_audience, 0);
    }

    // ── Window filtering ──────────────────────────────────────────────────────

    #[test]
    fn test_window_drops_out_of_range_observations() {
        let window = TimeWindow {
            since: parse_timestamp("2025-01-01T00:00:00Z"),
            until: None,
        };
        let mut aggregator =
            PresenceAggregator::new(vec![SourceKind::Live, SourceKind::Vod], Some(window));
        aggregator.ingest(&obs_at("xqc", "old", "2024-12-01T00:00:00Z"));
        aggregator.ingest(&obs_at("xqc", "new", "2025-01-02T00:00:00Z"));
        // No timestamp: always passes.
        aggregator.ingest(&obs("xqc", "timeless"));

        let (set, report) = finish_default(aggregator);
        assert_eq!(set.channels["xqc"].audience_size(), 2);
        assert_eq!(report.observation_count, 2);
    }

    // ── Pre-filters ───────────────────────────────────────────────────────────

    #[test]
    fn test_min_channel_viewers_filter() {
        let mut aggregator = make_aggregator();
        for viewer in ["a", "b", "c"] {
            aggregator.ingest(&obs("big", viewer));
        }
        aggregator.ingest(&obs("small", "a"));

        let config = AnalysisConfig {
            min_channel_viewers: 2,
            ..Default::default()
        };
        let (set, report) = aggregator.finish(&config);
        assert_eq!(set.channel_count(), 1);
        assert!(set.channels.contains_key("big"));
        assert_eq!(report.channel_count, 1);
    }

    #[test]
    fn test_repeat_viewer_filter_drops_one_offs_and_empty_channels() {
        let mut aggregator = make_aggregator();
        // shared appears in two channels, the others once each.
        aggregator.ingest(&obs("a", "shared"));
        aggregator.ingest(&obs("a", "only_a"));
        aggregator.ingest(&obs("b", "shared"));
        aggregator.ingest(&obs("c", "only_c"));

        let config = AnalysisConfig {
            min_viewer_appearances: 2,
            ..Default::default()
        };
        let (set, report) = aggregator.finish(&config);
        // Channel c loses its only viewer and disappears.
        assert_eq!(set.channel_count(), 2);
        assert!(!set.channels.contains_key("c"));
        assert_eq!(set.channels["a"].audience_size(), 1);
        assert_eq!(report.distinct_viewer_count, 1);
        assert_eq!(report.one_off_viewers, 0);
    }

    // ── Quality report ────────────────────────────────────────────────────────

    #[test]
    fn test_quality_report_statistics() {
        let mut aggregator = make_aggregator();
        // a: {v1, v2, v3}, b: {v1, v2}, c: {v1}
        for viewer in ["v1", "v2", "v3"] {
            aggregator.ingest(&obs("a", viewer));
        }
        for viewer in ["v1", "v2"] {
            aggregator.ingest(&obs("b", viewer));
        }
        aggregator.ingest(&obs("c", "v1"));

        let (_, report) = finish_default(aggregator);
        assert_eq!(report.channel_count, 3);
        assert_eq!(report.distinct_viewer_count, 3);
        assert_eq!(report.observation_count, 6);
        assert!((report.avg_audience_per_channel - 2.0).abs() < 1e-9);
        assert!((report.median_audience_per_channel - 2.0).abs() < 1e-9);
        assert_eq!(report.max_audience, 3);
        assert_eq!(report.min_audience, 1);
        // v1 in 3 channels, v2 in 2, v3 in 1 -> 6 memberships / 3 viewers.
        assert!((report.avg_channels_per_viewer - 2.0).abs() < 1e-9);
        assert_eq!(report.repeat_viewers_2plus, 2);
        assert_eq!(report.repeat_viewers_3plus, 1);
        assert_eq!(report.one_off_viewers, 1);
        assert!((report.one_off_percentage - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.source_counts["live"], 6);
    }

    #[test]
    fn test_empty_aggregation_is_valid() {
        let (set, report) = finish_default(make_aggregator());
        assert!(set.is_empty());
        assert_eq!(report.channel_count, 0);
        assert_eq!(report.distinct_viewer_count, 0);
        assert_eq!(report.one_off_percentage, 0.0);
        assert_eq!(report.avg_audience_per_channel, 0.0);
    }

    // ── aggregate() over real files ───────────────────────────────────────────

    #[test]
    fn test_aggregate_reads_sources_in_order() {
        let dir = TempDir::new().unwrap();
        let live_dir = dir.path().join("live");
        let vod_dir = dir.path().join("vod");
        std::fs::create_dir_all(&live_dir).unwrap();
        std::fs::create_dir_all(&vod_dir).unwrap();

        let snapshot = serde_json::json!({
            "channel": "xqc",
            "viewer_count": 100,
            "game_name": "Just Chatting",
            "chatters": ["alice", "bob"],
        });
        let mut f = std::fs::File::create(live_dir.join("snap.json")).unwrap();
        write!(f, "{}", snapshot).unwrap();

        let record = serde_json::json!({ "channel": "xqc", "viewer": "carol" });
        let mut f = std::fs::File::create(vod_dir.join("records.jsonl")).unwrap();
        writeln!(f, "{}", record).unwrap();

        let sources = [
            ObservationSource::live(&live_dir),
            ObservationSource::vod(&vod_dir),
        ];
        let (set, report) = aggregate(&sources, None, &AnalysisConfig::default());

        assert_eq!(set.channel_count(), 1);
        assert_eq!(set.channels["xqc"].audience_size(), 3);
        assert_eq!(set.channels["xqc"].metadata.viewer_count, 100);
        assert_eq!(report.source_counts["live"], 2);
        assert_eq!(report.source_counts["vod"], 1);
    }
}
