//! Multilevel modularity optimization.
//!
//! The classic scheme: sweep local moves until a full pass changes
//! nothing, contract communities into super-nodes, repeat on the coarser
//! graph, and compose the per-level assignments. Every scan runs in
//! ascending id order and ties resolve to the lowest community id, so a
//! given graph always produces the same partition.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::detector::{CommunityStrategy, StrategyOutcome};
use crate::graph::OverlapGraph;
use crate::partition::Partition;

/// Modularity gain below which another level is not opened.
const MIN_LEVEL_GAIN: f64 = 1e-7;

pub struct LouvainStrategy;

impl CommunityStrategy for LouvainStrategy {
    fn name(&self) -> &'static str {
        "louvain"
    }

    fn partition(
        &self,
        graph: &OverlapGraph,
        resolution: f64,
        max_passes: u32,
    ) -> StrategyOutcome {
        let mut level_graph = LevelGraph::from_overlap(graph);
        let mut membership: Vec<usize> = (0..graph.node_count()).collect();
        let mut levels = 0u32;
        let mut move_passes = 0u32;
        let mut converged = true;
        let mut prev_quality: Option<f64> = None;

        loop {
            let moves = local_move(&level_graph, resolution, max_passes);
            move_passes += moves.passes;
            converged &= moves.converged;

            let (assignment, community_count) = renumber(&moves.assignment);
            let quality = level_graph.modularity(&assignment, community_count, resolution);
            if let Some(prev) = prev_quality {
                if quality - prev < MIN_LEVEL_GAIN {
                    break;
                }
            }

            levels += 1;
            for slot in membership.iter_mut() {
                *slot = assignment[*slot];
            }
            debug!(
                "Level {}: {} nodes -> {} communities, modularity {:.6}",
                levels,
                level_graph.node_count(),
                community_count,
                quality
            );

            // A level that merged nothing cannot gain anything further,
            // and a single super-node cannot be split.
            if community_count <= 1 || community_count == level_graph.node_count() {
                break;
            }
            prev_quality = Some(quality);
            level_graph = level_graph.aggregate(&assignment, community_count);
        }

        StrategyOutcome {
            partition: Partition::from_assignments(
                membership.into_iter().map(|c| c as u32).collect(),
            ),
            levels,
            move_passes,
            converged,
        }
    }
}

// ── Local move ────────────────────────────────────────────────────────────────

struct MoveOutcome {
    assignment: Vec<usize>,
    passes: u32,
    converged: bool,
}

/// Sweep nodes in ascending id order, moving each to the neighboring
/// community with the strictly largest gain over returning home, until a
/// full pass moves nothing or the pass budget runs out.
///
/// With node `i` lifted out of its community, the gain of joining
/// community `c` is `k_i_in(c) - resolution * tot(c) * k_i / 2m`. The
/// node's own self-loop contributes equally to every candidate and is
/// left out.
fn local_move(graph: &LevelGraph, resolution: f64, max_passes: u32) -> MoveOutcome {
    let n = graph.node_count();
    let two_m = graph.total_weight;
    let mut assignment: Vec<usize> = (0..n).collect();
    if two_m <= 0.0 {
        return MoveOutcome {
            assignment,
            passes: 0,
            converged: true,
        };
    }

    let degrees: Vec<f64> = (0..n).map(|node| graph.degree(node)).collect();
    let mut tot: Vec<f64> = degrees.clone();
    // Scratch keyed by community id, zeroed again after every node.
    let mut weight_to: Vec<f64> = vec![0.0; n];
    let mut touched: Vec<usize> = Vec::new();

    let mut passes = 0u32;
    let mut converged = false;
    while passes < max_passes {
        passes += 1;
        let mut moved = 0usize;

        for node in 0..n {
            touched.clear();
            for &(neighbor, weight) in &graph.adjacency[node] {
                let community = assignment[neighbor];
                if weight_to[community] == 0.0 {
                    touched.push(community);
                }
                weight_to[community] += weight;
            }
            // Ascending community order makes the strict comparison
            // below resolve ties to the lowest id.
            touched.sort_unstable();

            let home = assignment[node];
            let k = degrees[node];
            tot[home] -= k;

            let mut best = home;
            let mut best_gain = weight_to[home] - resolution * tot[home] * k / two_m;
            for &candidate in &touched {
                if candidate == home {
                    continue;
                }
                let gain = weight_to[candidate] - resolution * tot[candidate] * k / two_m;
                if gain > best_gain {
                    best_gain = gain;
                    best = candidate;
                }
            }

            tot[best] += k;
            if best != home {
                assignment[node] = best;
                moved += 1;
            }
            for &community in &touched {
                weight_to[community] = 0.0;
            }
        }

        if moved == 0 {
            converged = true;
            break;
        }
    }

    MoveOutcome {
        assignment,
        passes,
        converged,
    }
}

/// Map sparse community ids to dense ones in first-appearance order.
fn renumber(assignment: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    let mut dense = Vec::with_capacity(assignment.len());
    for &community in assignment {
        let next = mapping.len();
        dense.push(*mapping.entry(community).or_insert(next));
    }
    (dense, mapping.len())
}

// ── Level graph ───────────────────────────────────────────────────────────────

/// Working copy of the graph at one coarsening level. Adjacency holds no
/// self entries; intra-community weight lives in `self_loops` and counts
/// twice toward a node's degree.
struct LevelGraph {
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    /// Directed weight sum (2m), invariant across levels.
    total_weight: f64,
}

impl LevelGraph {
    fn from_overlap(graph: &OverlapGraph) -> Self {
        let n = graph.node_count();
        let adjacency = (0..n as u32)
            .map(|id| {
                graph
                    .neighbors(id)
                    .iter()
                    .map(|&(nb, w)| (nb as usize, w as f64))
                    .collect()
            })
            .collect();
        Self {
            adjacency,
            self_loops: vec![0.0; n],
            total_weight: 2.0 * graph.total_edge_weight() as f64,
        }
    }

    fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    fn degree(&self, node: usize) -> f64 {
        let incident: f64 = self.adjacency[node].iter().map(|&(_, w)| w).sum();
        incident + 2.0 * self.self_loops[node]
    }

    /// Modularity of a dense assignment on this level's graph.
    fn modularity(&self, assignment: &[usize], community_count: usize, resolution: f64) -> f64 {
        if self.total_weight <= 0.0 {
            return 0.0;
        }
        let m = self.total_weight / 2.0;
        let mut intra = vec![0.0; community_count];
        let mut tot = vec![0.0; community_count];
        for node in 0..self.node_count() {
            let community = assignment[node];
            tot[community] += self.degree(node);
            intra[community] += self.self_loops[node];
            for &(neighbor, weight) in &self.adjacency[node] {
                if neighbor > node && assignment[neighbor] == community {
                    intra[community] += weight;
                }
            }
        }
        (0..community_count)
            .map(|c| intra[c] / m - resolution * (tot[c] / self.total_weight).powi(2))
            .sum()
    }

    /// Contract communities into super-nodes: inter-community weights
    /// sum, intra-community weight becomes the super-node's self-loop.
    fn aggregate(&self, assignment: &[usize], community_count: usize) -> LevelGraph {
        let mut self_loops = vec![0.0; community_count];
        let mut merged: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); community_count];
        for node in 0..self.node_count() {
            let community = assignment[node];
            self_loops[community] += self.self_loops[node];
            for &(neighbor, weight) in &self.adjacency[node] {
                let other = assignment[neighbor];
                if other == community {
                    if neighbor > node {
                        self_loops[community] += weight;
                    }
                } else {
                    *merged[community].entry(other).or_insert(0.0) += weight;
                }
            }
        }
        LevelGraph {
            adjacency: merged
                .into_iter()
                .map(|row| row.into_iter().collect())
                .collect(),
            self_loops,
            total_weight: self.total_weight,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
