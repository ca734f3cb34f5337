//! Community detection entry point.
//!
//! The algorithm sits behind the [`CommunityStrategy`] trait; the
//! configured strategy is resolved once and the surrounding bookkeeping
//! (degenerate graphs, renumbering, quality scoring, stats) is shared.

use atlas_core::config::{AnalysisConfig, StrategyKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::graph::OverlapGraph;
use crate::greedy::GreedyStrategy;
use crate::louvain::LouvainStrategy;
use crate::partition::{modularity, Partition};

// ── Strategy seam ─────────────────────────────────────────────────────────────

/// Raw result of one strategy run, before renumbering and scoring.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub partition: Partition,
    /// Coarsening levels composed (1 for single-level strategies).
    pub levels: u32,
    /// Local-move passes or merges performed, depending on the strategy.
    pub move_passes: u32,
    /// False when the pass budget ran out while moves were still landing.
    pub converged: bool,
}

/// A community detection algorithm over an overlap graph.
pub trait CommunityStrategy {
    fn name(&self) -> &'static str;

    /// Partition `graph`. Implementations must be deterministic: the
    /// same graph and parameters always produce the same assignment.
    fn partition(&self, graph: &OverlapGraph, resolution: f64, max_passes: u32)
        -> StrategyOutcome;
}

/// Resolve the configured strategy implementation.
pub fn strategy_for(kind: StrategyKind) -> Box<dyn CommunityStrategy> {
    match kind {
        StrategyKind::Louvain => Box::new(LouvainStrategy),
        StrategyKind::Greedy => Box::new(GreedyStrategy),
    }
}

// ── Detection ─────────────────────────────────────────────────────────────────

/// Detect communities with the strategy named in `config`.
pub fn detect(graph: &OverlapGraph, config: &AnalysisConfig) -> (Partition, DetectionStats) {
    let strategy = strategy_for(config.strategy);
    detect_with(graph, strategy.as_ref(), config)
}

/// Detect communities with an explicit strategy instance.
pub fn detect_with(
    graph: &OverlapGraph,
    strategy: &dyn CommunityStrategy,
    config: &AnalysisConfig,
) -> (Partition, DetectionStats) {
    let degenerate = graph.edge_count() == 0;
    let outcome = if degenerate {
        if !graph.is_empty() {
            warn!("Overlap graph has no edges; every channel keeps its own community");
        }
        StrategyOutcome {
            partition: Partition::singletons(graph.node_count()),
            levels: 0,
            move_passes: 0,
            converged: true,
        }
    } else {
        strategy.partition(graph, config.resolution, config.max_move_passes)
    };

    if !outcome.converged {
        warn!(
            "{} stopped after {} move passes without converging; keeping best partition",
            strategy.name(),
            config.max_move_passes
        );
    }

    let partition = outcome.partition.clone().renumbered();
    let quality = modularity(graph, &partition, config.resolution);
    let stats = DetectionStats::summarize(
        strategy.name(),
        &partition,
        quality,
        &outcome,
        config,
        degenerate,
    );
    debug!(
        "Detection: {} communities, modularity {:.6}, {} levels, {} passes",
        stats.community_count, stats.modularity, stats.levels, stats.move_passes
    );

    (partition, stats)
}

// ── Stats ─────────────────────────────────────────────────────────────────────

/// Detection summary reported in the result bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionStats {
    pub strategy: String,
    pub community_count: usize,
    pub modularity: f64,
    /// All community sizes, largest first.
    pub community_sizes: Vec<usize>,
    pub largest_community: usize,
    pub smallest_community: usize,
    pub singleton_count: usize,
    /// Communities smaller than the configured reporting floor.
    pub below_min_size: usize,
    pub levels: u32,
    pub move_passes: u32,
    pub converged: bool,
    /// True when the graph was empty or edgeless and detection was
    /// skipped outright.
    pub degenerate: bool,
}

impl DetectionStats {
    fn summarize(
        strategy: &str,
        partition: &Partition,
        quality: f64,
        outcome: &StrategyOutcome,
        config: &AnalysisConfig,
        degenerate: bool,
    ) -> Self {
        let sizes = partition.sizes_descending();
        Self {
            strategy: strategy.to_string(),
            community_count: sizes.len(),
            modularity: quality,
            largest_community: sizes.first().copied().unwrap_or(0),
            smallest_community: sizes.last().copied().unwrap_or(0),
            singleton_count: sizes.iter().filter(|&&s| s == 1).count(),
            below_min_size: sizes
                .iter()
                .filter(|&&s| s < config.min_community_size)
                .count(),
            community_sizes: sizes,
            levels: outcome.levels,
            move_passes: outcome.move_passes,
            converged: outcome.converged,
            degenerate,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
