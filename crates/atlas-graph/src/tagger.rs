//! Community labeling from member metadata.
//!
//! Each community gets a human-readable label derived from the
//! viewer-count-weighted category and language mix of its member
//! channels. Weighting by reported viewer count lets one large channel
//! define a community's identity even among many small ones.

use std::collections::{BTreeMap, HashSet};

use atlas_core::config::AnalysisConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::OverlapGraph;
use crate::partition::Partition;

// ── Output types ──────────────────────────────────────────────────────────────

/// Label and provenance for one community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityLabel {
    pub community_id: u32,
    /// Final label text, unique across the run.
    pub label: String,
    pub dominant_category: Option<String>,
    pub dominant_language: Option<String>,
    /// Weighted share of the dominant category among members with one.
    pub category_share: f64,
    /// Weighted share of the dominant language among members with one.
    pub language_share: f64,
    /// `max(category_share, language_share)`, a quick coherence signal.
    pub coherence_score: f64,
    pub channel_count: usize,
}

/// Tagging summary reported in the result bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaggingStats {
    pub total_labeled: usize,
    pub with_clear_category: usize,
    pub with_clear_language: usize,
    /// Communities that fell through to a generic `Community N` label.
    pub uncategorized: usize,
}

// ── Tagging ───────────────────────────────────────────────────────────────────

/// Label every community of `partition`.
///
/// The dominant category names the community when its weighted share
/// reaches `game_threshold`; otherwise the label is "Variety". A
/// language whose share reaches `language_threshold` is appended in
/// parentheses. When neither threshold is met the label falls back to
/// `Community N`. Duplicate texts get a numeric suffix in ascending
/// community-id order.
pub fn tag(
    partition: &Partition,
    graph: &OverlapGraph,
    config: &AnalysisConfig,
) -> (Vec<CommunityLabel>, TaggingStats) {
    let mut labels = Vec::new();
    let mut stats = TaggingStats::default();
    let mut used: HashSet<String> = HashSet::new();

    for (community_id, members) in partition.communities() {
        let weights = member_weights(graph, &members);

        let (dominant_category, category_share) =
            dominant_share(graph, &members, &weights, |record| {
                record.category.as_deref()
            });
        let (dominant_language, language_share) =
            dominant_share(graph, &members, &weights, |record| {
                record.language.as_deref()
            });

        let clear_category =
            dominant_category.is_some() && category_share >= config.game_threshold;
        let clear_language =
            dominant_language.is_some() && language_share >= config.language_threshold;

        let mut label = if clear_category {
            stats.with_clear_category += 1;
            dominant_category.clone().unwrap_or_default()
        } else {
            "Variety".to_string()
        };
        if clear_language {
            stats.with_clear_language += 1;
            label.push_str(&format!(" ({})", dominant_language.clone().unwrap_or_default()));
        }
        if !clear_category && !clear_language {
            stats.uncategorized += 1;
            label = format!("Community {community_id}");
        }

        let label = disambiguate(label, &mut used);
        debug!(
            "Community {}: \"{}\" ({} channels, category share {:.2}, language share {:.2})",
            community_id,
            label,
            members.len(),
            category_share,
            language_share
        );

        labels.push(CommunityLabel {
            community_id,
            label,
            dominant_category,
            dominant_language,
            category_share,
            language_share,
            coherence_score: category_share.max(language_share),
            channel_count: members.len(),
        });
    }

    stats.total_labeled = labels.len();
    (labels, stats)
}

// ── Internals ─────────────────────────────────────────────────────────────────

/// Per-member weights: reported viewer counts, or one each when no
/// member reports any viewers.
fn member_weights(graph: &OverlapGraph, members: &[u32]) -> Vec<f64> {
    let weights: Vec<f64> = members
        .iter()
        .map(|&id| graph.node(id).viewer_count as f64)
        .collect();
    if weights.iter().all(|&w| w == 0.0) {
        vec![1.0; members.len()]
    } else {
        weights
    }
}

/// Weighted share of the heaviest attribute value among members that
/// have one. `(None, 0.0)` when no member does. Equal weights resolve to
/// the lexicographically smallest value.
fn dominant_share<'a>(
    graph: &'a OverlapGraph,
    members: &[u32],
    weights: &[f64],
    attribute: impl Fn(&'a crate::graph::NodeRecord) -> Option<&'a str>,
) -> (Option<String>, f64) {
    let mut by_value: BTreeMap<&str, f64> = BTreeMap::new();
    let mut total = 0.0;
    for (&id, &weight) in members.iter().zip(weights) {
        let Some(value) = attribute(graph.node(id)).filter(|v| !v.is_empty()) else {
            continue;
        };
        *by_value.entry(value).or_insert(0.0) += weight;
        total += weight;
    }
    if total <= 0.0 {
        return (None, 0.0);
    }

    let mut dominant = "";
    let mut heaviest = 0.0;
    for (value, weight) in by_value {
        if weight > heaviest {
            heaviest = weight;
            dominant = value;
        }
    }
    (Some(dominant.to_string()), heaviest / total)
}

/// Keep the first occurrence of a text as-is; later occurrences get the
/// lowest free numeric suffix.
fn disambiguate(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{base} {n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
