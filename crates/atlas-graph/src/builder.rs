//! Overlap graph construction.
//!
//! Works from a viewer-to-channels inverted index: each viewer present
//! in `k >= 2` channels contributes one count to all `C(k, 2)` channel
//! pairs. Channel pairs are never enumerated directly, so channels with
//! no shared audience cost nothing.

use std::collections::{BTreeMap, HashMap};

use atlas_core::models::ChannelViewerSet;
use tracing::debug;

use crate::graph::{NodeRecord, OverlapGraph};

/// Build the overlap graph from an aggregated channel-viewer set. An
/// edge materializes only when the shared distinct audience of a channel
/// pair reaches `overlap_threshold`; every channel keeps its node either
/// way.
pub fn build(set: &ChannelViewerSet, overlap_threshold: u64) -> OverlapGraph {
    // Ordered channel iteration makes node ids positional: the id of a
    // channel is its rank in sorted name order.
    let nodes: Vec<NodeRecord> = set
        .channels
        .iter()
        .map(|(channel, audience)| NodeRecord {
            channel: channel.clone(),
            viewer_count: audience.metadata.viewer_count,
            category: audience.metadata.category.clone(),
            language: audience.metadata.language.clone(),
            audience_size: audience.viewers.len(),
        })
        .collect();

    let mut channels_by_viewer: HashMap<u32, Vec<u32>> = HashMap::new();
    for (id, audience) in set.channels.values().enumerate() {
        for &viewer in &audience.viewers {
            channels_by_viewer.entry(viewer).or_default().push(id as u32);
        }
    }

    // Channel lists ascend by construction, so every key has a < b.
    let mut pair_counts: HashMap<(u32, u32), u64> = HashMap::new();
    for channels in channels_by_viewer.values() {
        if channels.len() < 2 {
            continue;
        }
        for (i, &a) in channels.iter().enumerate() {
            for &b in &channels[i + 1..] {
                *pair_counts.entry((a, b)).or_insert(0) += 1;
            }
        }
    }

    let counted_pairs = pair_counts.len();
    let edges: BTreeMap<(u32, u32), u64> = pair_counts
        .into_iter()
        .filter(|&(_, weight)| weight >= overlap_threshold)
        .collect();
    debug!(
        "Overlap index: {} channels, {} overlapping pairs, {} edges at threshold {}",
        nodes.len(),
        counted_pairs,
        edges.len(),
        overlap_threshold
    );

    OverlapGraph::assemble(nodes, edges)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
