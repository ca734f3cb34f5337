//! End-to-end batch analysis pipeline.
//!
//! Five stages, logged with step numbers and timed: aggregate, build
//! graph, detect communities, tag, export. Source files are read
//! concurrently under a bounded worker pool; everything downstream of
//! ingestion is strictly sequential and deterministic.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use atlas_core::config::AnalysisConfig;
use atlas_core::error::Result;
use atlas_core::models::{ChannelViewerSet, QualityReport, TimeWindow};
use atlas_data::aggregator::PresenceAggregator;
use atlas_data::reader::{read_source, ObservationBatch, ObservationSource};
use atlas_graph::{builder, detector, tagger};
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::bundle::{write_analysis_json, write_graph_csvs, AnalysisBundle, Timings};

// ── AnalysisPipeline ──────────────────────────────────────────────────────────

/// Orchestrates one analysis run for a fixed configuration.
pub struct AnalysisPipeline {
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline and write `analysis.json`, `graph_nodes.csv`
    /// and `graph_edges.csv` into `out_dir`.
    ///
    /// Empty input is not an error: every stage produces its empty
    /// artifact and the bundle carries a warning instead.
    pub async fn run(
        &self,
        sources: &[ObservationSource],
        window: Option<TimeWindow>,
        out_dir: &Path,
    ) -> Result<AnalysisBundle> {
        self.config.validate()?;
        let started = Instant::now();
        let mut warnings = Vec::new();
        let mut timings = Timings::default();

        info!(
            "[1/5] Aggregating presence observations from {} source(s)",
            sources.len()
        );
        let stage = Instant::now();
        let (set, quality) = self.aggregate(sources, window, &mut warnings).await;
        timings.aggregate = stage.elapsed().as_secs_f64();
        info!(
            "Aggregated {} channels, {} distinct viewers ({} observations, {} malformed)",
            quality.channel_count,
            quality.distinct_viewer_count,
            quality.observation_count,
            quality.malformed_records
        );
        if set.is_empty() {
            warn!("No usable observations; the run will produce empty artifacts");
            warnings.push("no usable observations were found".to_string());
        }

        info!(
            "[2/5] Building overlap graph (threshold {})",
            self.config.overlap_threshold
        );
        let stage = Instant::now();
        let graph = builder::build(&set, self.config.overlap_threshold);
        let graph_stats = graph.stats();
        timings.build_graph = stage.elapsed().as_secs_f64();
        info!(
            "Graph has {} nodes, {} edges ({} isolated); largest component spans {} channels",
            graph_stats.node_count,
            graph_stats.edge_count,
            graph_stats.isolated_nodes,
            graph.largest_component().len()
        );

        info!(
            "[3/5] Detecting communities ({} strategy, resolution {})",
            self.config.strategy.as_str(),
            self.config.resolution
        );
        let stage = Instant::now();
        let (partition, detection) = detector::detect(&graph, &self.config);
        timings.detect = stage.elapsed().as_secs_f64();
        info!(
            "Found {} communities, modularity {:.4}",
            detection.community_count, detection.modularity
        );
        if detection.degenerate && !graph.is_empty() {
            warnings.push(
                "overlap graph has no edges; every channel is its own community".to_string(),
            );
        }
        if !detection.converged {
            warnings.push(format!(
                "community detection stopped after {} move passes without converging",
                self.config.max_move_passes
            ));
        }

        info!("[4/5] Tagging communities");
        let stage = Instant::now();
        let (labels, tagging) = tagger::tag(&partition, &graph, &self.config);
        timings.tag = stage.elapsed().as_secs_f64();
        info!(
            "Labeled {} communities ({} with a clear category)",
            tagging.total_labeled, tagging.with_clear_category
        );

        info!("[5/5] Saving results to {}", out_dir.display());
        let stage = Instant::now();
        write_graph_csvs(&graph, out_dir)?;
        timings.export = stage.elapsed().as_secs_f64();
        timings.total = started.elapsed().as_secs_f64();

        let bundle = AnalysisBundle::assemble(
            &self.config,
            &graph,
            &partition,
            labels,
            quality,
            graph_stats,
            detection,
            tagging,
            warnings,
            timings,
        );
        write_analysis_json(&bundle, out_dir)?;
        info!("Analysis finished in {:.2}s", timings.total);

        Ok(bundle)
    }

    /// Read every source concurrently (at most `read_concurrency` at a
    /// time) and fold the batches into one aggregate. Batches are folded
    /// in source order regardless of completion order. If the collection
    /// deadline passes, whatever arrived is kept and the stragglers are
    /// abandoned with a warning.
    async fn aggregate(
        &self,
        sources: &[ObservationSource],
        window: Option<TimeWindow>,
        warnings: &mut Vec<String>,
    ) -> (ChannelViewerSet, QualityReport) {
        let semaphore = Arc::new(Semaphore::new(self.config.read_concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<(usize, ObservationBatch)>(sources.len().max(1));

        for (index, source) in sources.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                match tokio::task::spawn_blocking(move || read_source(&source)).await {
                    Ok(batch) => {
                        let _ = tx.send((index, batch)).await;
                    }
                    Err(e) => warn!("Source reader task failed: {e}"),
                }
            });
        }
        drop(tx);

        let deadline = Duration::from_secs(self.config.source_timeout_secs);
        let mut batches: Vec<(usize, ObservationBatch)> = Vec::with_capacity(sources.len());
        let collect = async {
            while let Some(item) = rx.recv().await {
                batches.push(item);
            }
        };
        if tokio::time::timeout(deadline, collect).await.is_err() {
            let missing = sources.len().saturating_sub(batches.len());
            if missing > 0 {
                warn!(
                    "{missing} of {} source(s) timed out after {}s; continuing with partial data",
                    sources.len(),
                    self.config.source_timeout_secs
                );
                warnings.push(format!(
                    "{missing} source(s) timed out after {}s; results are partial",
                    self.config.source_timeout_secs
                ));
            }
        }

        batches.sort_by_key(|(index, _)| *index);
        let mut aggregator =
            PresenceAggregator::new(self.config.source_priority.clone(), window);
        for (_, batch) in batches {
            aggregator.ingest_batch(batch);
        }
        aggregator.finish(&self.config)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
