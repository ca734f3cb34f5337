//! Result bundle assembly and export.
//!
//! One run produces `analysis.json` (the full bundle, written atomically
//! via a temp file in the target directory) plus two flat CSV exports of
//! the graph for downstream tooling.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use atlas_core::config::AnalysisConfig;
use atlas_core::error::Result;
use atlas_core::models::QualityReport;
use atlas_graph::detector::DetectionStats;
use atlas_graph::graph::{GraphStats, OverlapGraph};
use atlas_graph::partition::Partition;
use atlas_graph::tagger::{CommunityLabel, TaggingStats};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

// ── Bundle types ──────────────────────────────────────────────────────────────

/// Everything one analysis run produced, in the shape written to
/// `analysis.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisBundle {
    /// RFC 3339 timestamp of bundle assembly.
    pub generated_at: String,
    /// Snapshot of the configuration the run used.
    pub config: AnalysisConfig,
    /// Channel name to community id.
    pub partition: BTreeMap<String, u32>,
    pub labels: Vec<CommunityLabel>,
    pub communities: Vec<CommunitySummary>,
    pub statistics: Statistics,
    pub warnings: Vec<String>,
    pub timings_secs: Timings,
}

/// Roster view of one community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySummary {
    pub id: u32,
    pub label: String,
    pub size: usize,
    /// Whether the community reaches the configured reporting floor.
    pub meets_min_size: bool,
    /// Member channels in name order.
    pub channels: Vec<String>,
}

/// Per-stage statistics blocks, one per pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub quality: QualityReport,
    pub graph: GraphStats,
    pub detection: DetectionStats,
    pub tagging: TaggingStats,
}

/// Wall-clock seconds per pipeline stage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Timings {
    pub aggregate: f64,
    pub build_graph: f64,
    pub detect: f64,
    pub tag: f64,
    pub export: f64,
    pub total: f64,
}

// ── Assembly ──────────────────────────────────────────────────────────────────

impl AnalysisBundle {
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        config: &AnalysisConfig,
        graph: &OverlapGraph,
        partition: &Partition,
        labels: Vec<CommunityLabel>,
        quality: QualityReport,
        graph_stats: GraphStats,
        detection: DetectionStats,
        tagging: TaggingStats,
        warnings: Vec<String>,
        timings: Timings,
    ) -> Self {
        let mut channel_partition = BTreeMap::new();
        for id in 0..graph.node_count() as u32 {
            channel_partition.insert(graph.name_of(id).to_string(), partition.community_of(id));
        }

        let label_for: HashMap<u32, &str> = labels
            .iter()
            .map(|l| (l.community_id, l.label.as_str()))
            .collect();
        let communities = partition
            .communities()
            .into_iter()
            .map(|(id, members)| CommunitySummary {
                id,
                label: label_for
                    .get(&id)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("Community {id}")),
                size: members.len(),
                meets_min_size: members.len() >= config.min_community_size,
                channels: members
                    .iter()
                    .map(|&node| graph.name_of(node).to_string())
                    .collect(),
            })
            .collect();

        Self {
            generated_at: Utc::now().to_rfc3339(),
            config: config.clone(),
            partition: channel_partition,
            labels,
            communities,
            statistics: Statistics {
                quality,
                graph: graph_stats,
                detection,
                tagging,
            },
            warnings,
            timings_secs: timings,
        }
    }
}

// ── Export ────────────────────────────────────────────────────────────────────

/// Write the bundle as `analysis.json`, atomically: the document lands
/// in a temp file inside `out_dir` first and is renamed into place.
pub fn write_analysis_json(bundle: &AnalysisBundle, out_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join("analysis.json");
    let tmp = out_dir.join("analysis.json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(bundle)?)?;
    std::fs::rename(&tmp, &path)?;
    info!("Wrote {}", path.display());
    Ok(path)
}

/// Write `graph_nodes.csv` and `graph_edges.csv` next to the bundle.
pub fn write_graph_csvs(graph: &OverlapGraph, out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;

    let nodes_path = out_dir.join("graph_nodes.csv");
    let mut nodes = std::io::BufWriter::new(std::fs::File::create(&nodes_path)?);
    writeln!(nodes, "id,viewer_count,category,language,audience")?;
    for row in graph.node_rows() {
        writeln!(
            nodes,
            "{},{},{},{},{}",
            sanitize(&row.channel),
            row.viewer_count,
            sanitize(row.category.as_deref().unwrap_or("")),
            sanitize(row.language.as_deref().unwrap_or("")),
            row.audience_size
        )?;
    }
    nodes.flush()?;

    let edges_path = out_dir.join("graph_edges.csv");
    let mut edges = std::io::BufWriter::new(std::fs::File::create(&edges_path)?);
    writeln!(edges, "source,target,weight")?;
    for row in graph.edge_rows() {
        writeln!(
            edges,
            "{},{},{}",
            sanitize(&row.source),
            sanitize(&row.target),
            row.weight
        )?;
    }
    edges.flush()?;

    info!(
        "Wrote {} and {}",
        nodes_path.display(),
        edges_path.display()
    );
    Ok(())
}

/// Commas inside a field would shift every following column.
fn sanitize(field: &str) -> String {
    field.replace(',', ";")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_graph::graph::{EdgeRow, NodeRecord};
    use atlas_graph::{detector, tagger};
    use tempfile::TempDir;

    fn make_graph() -> OverlapGraph {
        let nodes = vec![
            NodeRecord {
                channel: "alpha".to_string(),
                viewer_count: 100,
                category: Some("Chess".to_string()),
                language: Some("en".to_string()),
                audience_size: 3,
            },
            NodeRecord {
                channel: "bravo".to_string(),
                viewer_count: 50,
                category: Some("Chess".to_string()),
                language: Some("en".to_string()),
                audience_size: 2,
            },
            NodeRecord {
                channel: "solo".to_string(),
                viewer_count: 10,
                category: None,
                language: None,
                audience_size: 1,
            },
        ];
        let edges = [EdgeRow {
            source: "alpha".to_string(),
            target: "bravo".to_string(),
            weight: 4,
        }];
        OverlapGraph::from_rows(nodes, &edges).unwrap()
    }

    fn make_bundle() -> (AnalysisBundle, OverlapGraph) {
        let config = AnalysisConfig::default();
        let graph = make_graph();
        let (partition, detection) = detector::detect(&graph, &config);
        let (labels, tagging) = tagger::tag(&partition, &graph, &config);
        let bundle = AnalysisBundle::assemble(
            &config,
            &graph,
            &partition,
            labels,
            QualityReport::default(),
            graph.stats(),
            detection,
            tagging,
            vec!["sample warning".to_string()],
            Timings::default(),
        );
        (bundle, graph)
    }

    #[test]
    fn test_assemble_maps_channels_to_communities() {
        let (bundle, _) = make_bundle();
        assert_eq!(bundle.partition.len(), 3);
        assert_eq!(bundle.partition["alpha"], bundle.partition["bravo"]);
        assert_ne!(bundle.partition["alpha"], bundle.partition["solo"]);
    }

    #[test]
    fn test_assemble_builds_community_rosters() {
        let (bundle, _) = make_bundle();
        assert_eq!(bundle.communities.len(), 2);

        let first = &bundle.communities[0];
        assert_eq!(first.id, 0);
        assert_eq!(first.channels, vec!["alpha", "bravo"]);
        assert_eq!(first.size, 2);
        assert!(first.meets_min_size);
        assert_eq!(first.label, "Chess (en)");

        let second = &bundle.communities[1];
        assert_eq!(second.channels, vec!["solo"]);
        assert_eq!(second.label, "Community 1");
    }

    #[test]
    fn test_labels_match_summaries() {
        let (bundle, _) = make_bundle();
        for summary in &bundle.communities {
            let label = bundle
                .labels
                .iter()
                .find(|l| l.community_id == summary.id)
                .unwrap();
            assert_eq!(label.label, summary.label);
            assert_eq!(label.channel_count, summary.size);
        }
    }

    #[test]
    fn test_analysis_json_round_trips() {
        let (bundle, _) = make_bundle();
        let dir = TempDir::new().unwrap();

        let path = write_analysis_json(&bundle, dir.path()).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("analysis.json.tmp").exists());

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: AnalysisBundle = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.partition, bundle.partition);
        assert_eq!(parsed.communities, bundle.communities);
        assert_eq!(parsed.warnings, bundle.warnings);
        assert_eq!(
            parsed.statistics.detection.community_count,
            bundle.statistics.detection.community_count
        );
    }

    #[test]
    fn test_graph_csvs_have_expected_shape() {
        let (_, graph) = make_bundle();
        let dir = TempDir::new().unwrap();
        write_graph_csvs(&graph, dir.path()).unwrap();

        let nodes = std::fs::read_to_string(dir.path().join("graph_nodes.csv")).unwrap();
        let mut lines = nodes.lines();
        assert_eq!(
            lines.next(),
            Some("id,viewer_count,category,language,audience")
        );
        assert_eq!(lines.next(), Some("alpha,100,Chess,en,3"));
        assert_eq!(lines.clone().count(), 2);

        let edges = std::fs::read_to_string(dir.path().join("graph_edges.csv")).unwrap();
        assert_eq!(edges, "source,target,weight\nalpha,bravo,4\n");
    }

    #[test]
    fn test_csv_fields_are_comma_sanitized() {
        let nodes = vec![NodeRecord {
            channel: "weird,name".to_string(),
            viewer_count: 1,
            category: Some("Talk, Shows".to_string()),
            language: None,
            audience_size: 1,
        }];
        let graph = OverlapGraph::from_rows(nodes, &[]).unwrap();
        let dir = TempDir::new().unwrap();
        write_graph_csvs(&graph, dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("graph_nodes.csv")).unwrap();
        assert!(content.contains("weird;name,1,Talk; Shows,,1"));
    }

    #[test]
    fn test_empty_run_produces_empty_artifacts() {
        let config = AnalysisConfig::default();
        let graph = OverlapGraph::from_rows(Vec::new(), &[]).unwrap();
        let (partition, detection) = detector::detect(&graph, &config);
        let (labels, tagging) = tagger::tag(&partition, &graph, &config);
        let bundle = AnalysisBundle::assemble(
            &config,
            &graph,
            &partition,
            labels,
            QualityReport::default(),
            graph.stats(),
            detection,
            tagging,
            Vec::new(),
            Timings::default(),
        );

        assert!(bundle.partition.is_empty());
        assert!(bundle.communities.is_empty());
        assert!(bundle.labels.is_empty());

        let dir = TempDir::new().unwrap();
        write_analysis_json(&bundle, dir.path()).unwrap();
        write_graph_csvs(&graph, dir.path()).unwrap();
        let edges = std::fs::read_to_string(dir.path().join("graph_edges.csv")).unwrap();
        assert_eq!(edges, "source,target,weight\n");
    }
}
