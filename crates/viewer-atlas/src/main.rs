mod bootstrap;

use std::path::{Path, PathBuf};

use anyhow::Result;
use atlas_core::error::AtlasError;
use atlas_core::settings::Settings;
use atlas_data::reader::ObservationSource;
use atlas_runtime::bundle::{AnalysisBundle, CommunitySummary};
use atlas_runtime::pipeline::AnalysisPipeline;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::ensure_directories(&settings.out_dir)?;
    bootstrap::setup_logging(settings.effective_log_level(), settings.log_file.as_ref())?;

    tracing::info!("Viewer Atlas v{} starting", env!("CARGO_PKG_VERSION"));

    let config = settings.to_config()?;
    let data_dir = resolve_data_dir(&settings)?;
    tracing::info!(
        "Data: {}, Output: {}, Preset: {:?}",
        data_dir.display(),
        settings.out_dir.display(),
        settings.preset
    );

    let mut sources = vec![ObservationSource::live(&data_dir)];
    if let Some(vod_dir) = &settings.vod_dir {
        if !vod_dir.is_dir() {
            return Err(AtlasError::DataPathNotFound(vod_dir.clone()).into());
        }
        sources.push(ObservationSource::vod(vod_dir));
    }

    let pipeline = AnalysisPipeline::new(config);
    let bundle = pipeline
        .run(&sources, settings.time_window(), &settings.out_dir)
        .await?;

    if !settings.quiet {
        print_summary(&bundle, &settings.out_dir);
    }

    Ok(())
}

/// Explicit `--data-dir` must exist; otherwise fall back to the
/// well-known collector directories.
fn resolve_data_dir(settings: &Settings) -> Result<PathBuf> {
    match &settings.data_dir {
        Some(dir) => {
            if dir.exists() {
                Ok(dir.clone())
            } else {
                Err(AtlasError::DataPathNotFound(dir.clone()).into())
            }
        }
        None => bootstrap::discover_data_dir().ok_or_else(|| {
            anyhow::anyhow!(
                "no observation directory found (tried ./logs, ./data, ~/.viewer-atlas/data); \
                 pass --data-dir"
            )
        }),
    }
}

/// Human-readable run summary printed to stdout after a successful run.
fn print_summary(bundle: &AnalysisBundle, out_dir: &Path) {
    let stats = &bundle.statistics;
    println!();
    println!(
        "Analyzed {} channels, {} edges -> {} communities (modularity {:.4})",
        stats.graph.node_count,
        stats.graph.edge_count,
        stats.detection.community_count,
        stats.detection.modularity
    );

    let mut largest: Vec<&CommunitySummary> = bundle.communities.iter().collect();
    largest.sort_by(|a, b| b.size.cmp(&a.size).then(a.id.cmp(&b.id)));
    for community in largest.iter().take(10) {
        println!(
            "  [{:>3}] {} ({} channels)",
            community.id, community.label, community.size
        );
    }
    if largest.len() > 10 {
        println!("  ... and {} more", largest.len() - 10);
    }

    for warning in &bundle.warnings {
        println!("Warning: {warning}");
    }
    println!("Results written to {}", out_dir.display());
}
