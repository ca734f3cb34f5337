//! Greedy agglomerative community detection.
//!
//! Fallback strategy: start from singletons and repeatedly merge the
//! connected community pair with the largest positive modularity gain
//! until no merge improves the score. Quadratic in community count but
//! entirely order-independent, which makes it a useful cross-check for
//! the multilevel strategy.

use std::collections::BTreeMap;

use tracing::debug;

use crate::detector::{CommunityStrategy, StrategyOutcome};
use crate::graph::OverlapGraph;
use crate::partition::Partition;

pub struct GreedyStrategy;

impl CommunityStrategy for GreedyStrategy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    /// The merge loop terminates on its own after at most `n - 1`
    /// merges, so the pass budget is not consulted.
    fn partition(
        &self,
        graph: &OverlapGraph,
        resolution: f64,
        _max_passes: u32,
    ) -> StrategyOutcome {
        let n = graph.node_count();
        let mut assignment: Vec<u32> = (0..n as u32).collect();
        let m = graph.total_edge_weight() as f64;
        if m <= 0.0 {
            return StrategyOutcome {
                partition: Partition::from_assignments(assignment),
                levels: 1,
                move_passes: 0,
                converged: true,
            };
        }
        let two_m_sq = 2.0 * m * m;

        // Communities keep the id of their lowest member node.
        let mut tot: Vec<f64> = (0..n as u32)
            .map(|id| graph.weighted_degree(id) as f64)
            .collect();
        let mut links: BTreeMap<(u32, u32), f64> = BTreeMap::new();
        for node in 0..n as u32 {
            for &(neighbor, weight) in graph.neighbors(node) {
                if neighbor > node {
                    links.insert((node, neighbor), weight as f64);
                }
            }
        }

        let mut merges = 0u32;
        loop {
            // Ascending pair order plus the strict comparison resolves
            // gain ties to the lexicographically smallest pair.
            let mut best: Option<((u32, u32), f64)> = None;
            for (&pair, &weight) in &links {
                let gain = weight / m
                    - resolution * tot[pair.0 as usize] * tot[pair.1 as usize] / two_m_sq;
                let better = match best {
                    None => gain > 0.0,
                    Some((_, best_gain)) => gain > best_gain,
                };
                if better {
                    best = Some((pair, gain));
                }
            }
            let Some(((keep, fold), gain)) = best else {
                break;
            };
            debug!(
                "Merging community {} into {} (gain {:.6})",
                fold, keep, gain
            );

            merges += 1;
            for community in assignment.iter_mut() {
                if *community == fold {
                    *community = keep;
                }
            }
            tot[keep as usize] += tot[fold as usize];
            tot[fold as usize] = 0.0;

            let mut rewired: BTreeMap<(u32, u32), f64> = BTreeMap::new();
            for ((a, b), weight) in links {
                let a = if a == fold { keep } else { a };
                let b = if b == fold { keep } else { b };
                if a == b {
                    continue;
                }
                *rewired.entry((a.min(b), a.max(b))).or_insert(0.0) += weight;
            }
            links = rewired;
        }

        StrategyOutcome {
            partition: Partition::from_assignments(assignment),
            levels: 1,
            move_passes: merges,
            converged: true,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeRow, NodeRecord};

    fn make_graph(channels: &[&str], edges: &[(&str, &str, u64)]) -> OverlapGraph {
        let nodes = channels
            .iter()
            .map(|c| NodeRecord {
                channel: c.to_string(),
                ..Default::default()
            })
            .collect();
        let rows: Vec<EdgeRow> = edges
            .iter()
            .map(|&(s, t, w)| EdgeRow {
                source: s.to_string(),
                target: t.to_string(),
                weight: w,
            })
            .collect();
        OverlapGraph::from_rows(nodes, &rows).unwrap()
    }

    fn run(graph: &OverlapGraph) -> StrategyOutcome {
        GreedyStrategy.partition(graph, 1.0, 100)
    }

    #[test]
    fn test_single_edge_merges() {
        let graph = make_graph(&["a", "b", "c"], &[("a", "b", 5)]);
        let outcome = run(&graph);
        let p = outcome.partition;
        assert_eq!(p.community_of(0), p.community_of(1));
        assert_ne!(p.community_of(0), p.community_of(2));
        assert_eq!(outcome.move_passes, 1);
    }

    #[test]
    fn test_two_cliques_stop_at_the_bridge() {
        let graph = make_graph(
            &["a", "b", "c", "d", "e", "f"],
            &[
                ("a", "b", 5),
                ("a", "c", 5),
                ("b", "c", 5),
                ("d", "e", 5),
                ("d", "f", 5),
                ("e", "f", 5),
                ("c", "d", 1),
            ],
        );
        let outcome = run(&graph);
        let p = outcome.partition.renumbered();
        assert_eq!(p.as_slice(), &[0, 0, 0, 1, 1, 1]);
        assert_eq!(outcome.move_passes, 4);
        assert!(outcome.converged);
    }

    #[test]
    fn test_gain_ties_merge_smallest_pair_first() {
        // Two identical disjoint edges; (a, b) must merge before (c, d).
        let graph = make_graph(&["a", "b", "c", "d"], &[("a", "b", 1), ("c", "d", 1)]);
        let outcome = run(&graph);
        let p = outcome.partition;
        assert_eq!(p.community_of(0), p.community_of(1));
        assert_eq!(p.community_of(2), p.community_of(3));
        assert_ne!(p.community_of(0), p.community_of(2));
        // Merged communities keep their lowest member id.
        assert_eq!(p.community_of(0), 0);
        assert_eq!(p.community_of(2), 2);
    }

    #[test]
    fn test_edgeless_graph_is_identity() {
        let outcome = run(&make_graph(&["a", "b"], &[]));
        assert_eq!(outcome.partition.as_slice(), &[0, 1]);
        assert_eq!(outcome.move_passes, 0);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let graph = make_graph(
            &["a", "b", "c", "d", "e"],
            &[
                ("a", "b", 2),
                ("b", "c", 2),
                ("a", "c", 1),
                ("d", "e", 3),
                ("c", "d", 1),
            ],
        );
        let first = run(&graph);
        let second = run(&graph);
        assert_eq!(first.partition, second.partition);
        assert_eq!(first.move_passes, second.move_passes);
    }
}
