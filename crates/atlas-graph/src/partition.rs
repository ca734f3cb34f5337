//! Node-to-community assignments and modularity scoring.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::graph::OverlapGraph;

// ── Partition ─────────────────────────────────────────────────────────────────

/// A total assignment of graph nodes to communities: index position is
/// the node id. Detector output is renumbered so community ids are dense
/// from zero in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    assignments: Vec<u32>,
}

impl Partition {
    /// Every node alone in its own community.
    pub fn singletons(node_count: usize) -> Self {
        Self {
            assignments: (0..node_count as u32).collect(),
        }
    }

    pub fn from_assignments(assignments: Vec<u32>) -> Self {
        Self { assignments }
    }

    pub fn community_of(&self, node: u32) -> u32 {
        self.assignments[node as usize]
    }

    /// Number of nodes covered by the partition.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.assignments
    }

    pub fn community_count(&self) -> usize {
        self.assignments
            .iter()
            .collect::<std::collections::HashSet<_>>()
            .len()
    }

    /// Renumber communities densely by first appearance in node-id
    /// order. Idempotent on already-dense partitions.
    pub fn renumbered(mut self) -> Self {
        let mut mapping: HashMap<u32, u32> = HashMap::new();
        for slot in self.assignments.iter_mut() {
            let next = mapping.len() as u32;
            *slot = *mapping.entry(*slot).or_insert(next);
        }
        self
    }

    /// Members of every community, node ids ascending, keyed by
    /// community id ascending.
    pub fn communities(&self) -> BTreeMap<u32, Vec<u32>> {
        let mut map: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for (node, &community) in self.assignments.iter().enumerate() {
            map.entry(community).or_default().push(node as u32);
        }
        map
    }

    /// Community sizes, largest first.
    pub fn sizes_descending(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.communities().values().map(Vec::len).collect();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes
    }
}

// ── Modularity ────────────────────────────────────────────────────────────────

/// Recompute the modularity of `partition` on `graph` from scratch:
/// `Q = sum_c [ intra_c / m - resolution * (tot_c / 2m)^2 ]`, where
/// `intra_c` is the once-counted edge weight inside community `c`,
/// `tot_c` the summed weighted degree of its members, and `m` the total
/// undirected edge weight. An edgeless graph scores 0.
///
/// Independent of the detector's incremental bookkeeping, so the two can
/// be checked against each other.
pub fn modularity(graph: &OverlapGraph, partition: &Partition, resolution: f64) -> f64 {
    debug_assert_eq!(partition.len(), graph.node_count());
    let m = graph.total_edge_weight() as f64;
    if m <= 0.0 {
        return 0.0;
    }
    let two_m = 2.0 * m;

    let mut intra: BTreeMap<u32, f64> = BTreeMap::new();
    let mut tot: BTreeMap<u32, f64> = BTreeMap::new();
    for node in 0..graph.node_count() as u32 {
        let community = partition.community_of(node);
        *tot.entry(community).or_insert(0.0) += graph.weighted_degree(node) as f64;
        for &(neighbor, weight) in graph.neighbors(node) {
            if neighbor > node && partition.community_of(neighbor) == community {
                *intra.entry(community).or_insert(0.0) += weight as f64;
            }
        }
    }

    tot.iter()
        .map(|(community, degree_sum)| {
            let inside = intra.get(community).copied().unwrap_or(0.0);
            inside / m - resolution * (degree_sum / two_m).powi(2)
        })
        .sum()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
