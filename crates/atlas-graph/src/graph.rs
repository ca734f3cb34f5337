//! Weighted undirected channel-overlap graph.
//!
//! Node ids are dense `u32` indices assigned in sorted channel-name
//! order, so id order and lexicographic channel order coincide. Every
//! edge is mirrored into both endpoint adjacency lists and neighbor
//! lists stay sorted by node id. Channels with no surviving edge remain
//! in the graph as isolated nodes.

use std::collections::{BTreeMap, HashMap};

use atlas_core::error::{AtlasError, Result};
use serde::{Deserialize, Serialize};

/// How many channels the stats report lists by weighted degree.
const TOP_CONNECTED_LIMIT: usize = 10;

// ── Node and edge rows ────────────────────────────────────────────────────────

/// Per-channel record attached to a graph node. Doubles as the node row
/// for export and reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub channel: String,
    /// Reported concurrent viewer count from the winning metadata.
    pub viewer_count: u64,
    pub category: Option<String>,
    pub language: Option<String>,
    /// Distinct chatters observed in the channel.
    pub audience_size: usize,
}

/// One undirected edge with `source < target` lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub source: String,
    pub target: String,
    pub weight: u64,
}

// ── OverlapGraph ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OverlapGraph {
    nodes: Vec<NodeRecord>,
    adjacency: Vec<Vec<(u32, u64)>>,
    ids: HashMap<String, u32>,
    edge_count: usize,
    total_edge_weight: u64,
}

impl OverlapGraph {
    /// Assemble a graph from node records already sorted by channel name
    /// and an edge map keyed by `(low_id, high_id)`.
    pub(crate) fn assemble(nodes: Vec<NodeRecord>, edges: BTreeMap<(u32, u32), u64>) -> Self {
        let ids = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.channel.clone(), i as u32))
            .collect();

        let mut adjacency: Vec<Vec<(u32, u64)>> = vec![Vec::new(); nodes.len()];
        let mut total_edge_weight = 0u64;
        for (&(a, b), &weight) in &edges {
            adjacency[a as usize].push((b, weight));
            adjacency[b as usize].push((a, weight));
            total_edge_weight += weight;
        }
        for list in &mut adjacency {
            list.sort_unstable_by_key(|&(id, _)| id);
        }

        Self {
            nodes,
            adjacency,
            ids,
            edge_count: edges.len(),
            total_edge_weight,
        }
    }

    /// Reconstruct a graph from exported node and edge rows. Inverse of
    /// [`node_rows`](Self::node_rows) / [`edge_rows`](Self::edge_rows).
    pub fn from_rows(mut nodes: Vec<NodeRecord>, edges: &[EdgeRow]) -> Result<Self> {
        nodes.sort_by(|a, b| a.channel.cmp(&b.channel));
        for pair in nodes.windows(2) {
            if pair[0].channel == pair[1].channel {
                return Err(AtlasError::Graph(format!(
                    "duplicate channel \"{}\" in node rows",
                    pair[0].channel
                )));
            }
        }

        let edge_map = {
            let ids: HashMap<&str, u32> = nodes
                .iter()
                .enumerate()
                .map(|(i, n)| (n.channel.as_str(), i as u32))
                .collect();
            let lookup = |name: &str| {
                ids.get(name).copied().ok_or_else(|| {
                    AtlasError::Graph(format!("edge references unknown channel \"{name}\""))
                })
            };

            let mut edge_map: BTreeMap<(u32, u32), u64> = BTreeMap::new();
            for row in edges {
                let a = lookup(&row.source)?;
                let b = lookup(&row.target)?;
                if a == b {
                    return Err(AtlasError::Graph(format!(
                        "self-loop on channel \"{}\"",
                        row.source
                    )));
                }
                if row.weight == 0 {
                    return Err(AtlasError::Graph(format!(
                        "zero-weight edge {} -- {}",
                        row.source, row.target
                    )));
                }
                let key = (a.min(b), a.max(b));
                if edge_map.insert(key, row.weight).is_some() {
                    return Err(AtlasError::Graph(format!(
                        "duplicate edge {} -- {}",
                        row.source, row.target
                    )));
                }
            }
            edge_map
        };

        Ok(Self::assemble(nodes, edge_map))
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sum of undirected edge weights, each edge counted once.
    pub fn total_edge_weight(&self) -> u64 {
        self.total_edge_weight
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn node(&self, id: u32) -> &NodeRecord {
        &self.nodes[id as usize]
    }

    pub fn name_of(&self, id: u32) -> &str {
        &self.nodes[id as usize].channel
    }

    pub fn id_of(&self, channel: &str) -> Option<u32> {
        self.ids.get(channel).copied()
    }

    /// Neighbor list of `id`, sorted by node id.
    pub fn neighbors(&self, id: u32) -> &[(u32, u64)] {
        &self.adjacency[id as usize]
    }

    /// Sum of incident edge weights.
    pub fn weighted_degree(&self, id: u32) -> u64 {
        self.adjacency[id as usize].iter().map(|&(_, w)| w).sum()
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Neighbors of a channel by name, sorted by descending shared
    /// audience (node id breaks ties). Empty when the channel is unknown
    /// or isolated.
    pub fn neighbors_of(&self, channel: &str) -> Vec<(&str, u64)> {
        let Some(id) = self.id_of(channel) else {
            return Vec::new();
        };
        let mut neighbors: Vec<(u32, u64)> = self.adjacency[id as usize].clone();
        neighbors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        neighbors
            .into_iter()
            .map(|(nb, w)| (self.name_of(nb), w))
            .collect()
    }

    /// Channels of the largest connected component, sorted by name.
    /// Among equally sized components the one containing the smallest
    /// node id wins.
    pub fn largest_component(&self) -> Vec<&str> {
        let n = self.nodes.len();
        let mut visited = vec![false; n];
        let mut best: Vec<u32> = Vec::new();

        for start in 0..n as u32 {
            if visited[start as usize] {
                continue;
            }
            let mut component = vec![start];
            visited[start as usize] = true;
            let mut frontier = vec![start];
            while let Some(node) = frontier.pop() {
                for &(nb, _) in &self.adjacency[node as usize] {
                    if !visited[nb as usize] {
                        visited[nb as usize] = true;
                        component.push(nb);
                        frontier.push(nb);
                    }
                }
            }
            if component.len() > best.len() {
                best = component;
            }
        }

        best.sort_unstable();
        best.into_iter().map(|id| self.name_of(id)).collect()
    }

    // ── Export ────────────────────────────────────────────────────────────────

    /// Node rows in id order.
    pub fn node_rows(&self) -> Vec<NodeRecord> {
        self.nodes.clone()
    }

    /// Edge rows with `source < target`, sorted by `(source, target)`.
    pub fn edge_rows(&self) -> Vec<EdgeRow> {
        let mut rows = Vec::with_capacity(self.edge_count);
        for (id, list) in self.adjacency.iter().enumerate() {
            for &(nb, weight) in list {
                if nb as usize > id {
                    rows.push(EdgeRow {
                        source: self.nodes[id].channel.clone(),
                        target: self.nodes[nb as usize].channel.clone(),
                        weight,
                    });
                }
            }
        }
        rows
    }

    // ── Statistics ────────────────────────────────────────────────────────────

    pub fn stats(&self) -> GraphStats {
        let node_count = self.nodes.len();
        let isolated_nodes = self.adjacency.iter().filter(|l| l.is_empty()).count();
        let max_edge_weight = self
            .adjacency
            .iter()
            .flatten()
            .map(|&(_, w)| w)
            .max()
            .unwrap_or(0);
        let avg_edge_weight = if self.edge_count == 0 {
            0.0
        } else {
            self.total_edge_weight as f64 / self.edge_count as f64
        };
        let possible_edges = node_count.saturating_sub(1) * node_count / 2;
        let density = if possible_edges == 0 {
            0.0
        } else {
            self.edge_count as f64 / possible_edges as f64
        };

        let mut by_degree: Vec<(u32, u64)> = (0..node_count as u32)
            .map(|id| (id, self.weighted_degree(id)))
            .filter(|&(_, degree)| degree > 0)
            .collect();
        by_degree.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        by_degree.truncate(TOP_CONNECTED_LIMIT);
        let top_connected = by_degree
            .into_iter()
            .map(|(id, weighted_degree)| ChannelDegree {
                channel: self.name_of(id).to_string(),
                weighted_degree,
            })
            .collect();

        GraphStats {
            node_count,
            edge_count: self.edge_count,
            total_edge_weight: self.total_edge_weight,
            avg_edge_weight,
            max_edge_weight,
            isolated_nodes,
            density,
            top_connected,
        }
    }
}

/// Shape summary of a built graph, reported in the result bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub total_edge_weight: u64,
    pub avg_edge_weight: f64,
    pub max_edge_weight: u64,
    pub isolated_nodes: usize,
    /// Edges over `n * (n - 1) / 2`.
    pub density: f64,
    pub top_connected: Vec<ChannelDegree>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDegree {
    pub channel: String,
    pub weighted_degree: u64,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
