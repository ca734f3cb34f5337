//! Observation-file discovery and parsing for the viewer atlas.
//!
//! Reads presence observations from a source directory in any of the
//! supported shapes: JSONL record streams, JSON snapshot documents
//! (single object or array), columnar JSON batches, and CSV rows.
//! Malformed records are counted and skipped; a bad line never aborts
//! a run.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use atlas_core::models::{parse_timestamp, ChannelMetadata, PresenceObservation, SourceKind};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

// ── Source descriptors ────────────────────────────────────────────────────────

/// A directory (or single file) holding observation files, plus the
/// source kind assumed for records that do not name one.
#[derive(Debug, Clone)]
pub struct ObservationSource {
    pub path: PathBuf,
    pub default_kind: SourceKind,
}

impl ObservationSource {
    pub fn live(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_kind: SourceKind::Live,
        }
    }

    pub fn vod(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_kind: SourceKind::Vod,
        }
    }
}

/// Everything extracted from one source: presence observations, channel
/// metadata candidates awaiting conflict resolution, and counters.
#[derive(Debug, Clone, Default)]
pub struct ObservationBatch {
    pub observations: Vec<PresenceObservation>,
    pub metadata: Vec<(String, ChannelMetadata)>,
    pub malformed: u64,
    pub files_read: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all observation files (`.jsonl`, `.json`, `.csv`) recursively
/// under `path`, sorted by path so ingestion order is deterministic.
pub fn find_observation_files(path: &Path) -> Vec<PathBuf> {
    if !path.exists() {
        warn!("Data path does not exist: {}", path.display());
        return Vec::new();
    }
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| matches!(ext, "jsonl" | "json" | "csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Read every observation file under `source`, dispatching on extension.
/// Never fails: unreadable files are logged and skipped, unparseable
/// records are counted in `malformed`.
pub fn read_source(source: &ObservationSource) -> ObservationBatch {
    let mut batch = ObservationBatch::default();
    let files = find_observation_files(&source.path);
    if files.is_empty() {
        debug!("No observation files under {}", source.path.display());
        return batch;
    }

    for file in &files {
        let before = batch.observations.len();
        match file.extension().and_then(|e| e.to_str()) {
            Some("jsonl") => parse_jsonl_file(file, source.default_kind, &mut batch),
            Some("json") => parse_json_file(file, source.default_kind, &mut batch),
            Some("csv") => parse_csv_file(file, source.default_kind, &mut batch),
            _ => continue,
        }
        batch.files_read += 1;
        debug!(
            "File {}: {} observations",
            file.display(),
            batch.observations.len() - before
        );
    }

    debug!(
        "Source {}: {} files, {} observations, {} malformed",
        source.path.display(),
        batch.files_read,
        batch.observations.len(),
        batch.malformed
    );
    batch
}

// ── Raw file shapes ───────────────────────────────────────────────────────────

/// One line of a JSONL record stream. Field presence is checked after
/// deserialization so a missing identifier counts as malformed instead
/// of failing the whole line on type grounds.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(alias = "channel_login")]
    channel: Option<String>,
    #[serde(alias = "chatter")]
    viewer: Option<String>,
    #[serde(alias = "_source")]
    source: Option<String>,
    #[serde(alias = "timestamp")]
    observed_at: Option<serde_json::Value>,
    #[serde(alias = "window", alias = "bucket_id")]
    window_id: Option<u64>,
}

/// A snapshot document: one channel roster plus its metadata.
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(alias = "channel_login")]
    channel: Option<String>,
    #[serde(default)]
    timestamp: Option<serde_json::Value>,
    #[serde(default, alias = "viewers")]
    viewer_count: Option<u64>,
    #[serde(default, alias = "game")]
    game_name: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "_source")]
    source: Option<String>,
    #[serde(default, alias = "bucket_id")]
    window_id: Option<u64>,
    #[serde(default)]
    chatters: Vec<String>,
}

/// A columnar batch: parallel arrays assembled row-wise.
#[derive(Debug, Deserialize)]
struct RawColumns {
    channels: Vec<serde_json::Value>,
    viewers: Vec<serde_json::Value>,
    #[serde(default)]
    sources: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    observed_at: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    windows: Option<Vec<serde_json::Value>>,
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Accepts RFC 3339 / ISO strings and epoch seconds or milliseconds.
fn parse_timestamp_value(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => parse_timestamp(s),
        serde_json::Value::Number(n) => {
            let epoch = n.as_i64()?;
            if epoch > 10_000_000_000 {
                DateTime::from_timestamp_millis(epoch)
            } else {
                DateTime::from_timestamp(epoch, 0)
            }
        }
        _ => None,
    }
}

fn resolve_source(tag: Option<&str>, default_kind: SourceKind) -> SourceKind {
    tag.and_then(SourceKind::parse).unwrap_or(default_kind)
}

fn parse_jsonl_file(path: &Path, default_kind: SourceKind, batch: &mut ObservationBatch) {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to read file {}: {}", path.display(), e);
            return;
        }
    };

    let reader = std::io::BufReader::new(file);
    for line_result in reader.lines() {
        let line = match line_result {
            Ok(l) => l,
            Err(_) => continue,
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: RawRecord = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                debug!("Failed to parse record in {}: {}", path.display(), e);
                batch.malformed += 1;
                continue;
            }
        };
        push_record(record, default_kind, batch);
    }
}

fn push_record(record: RawRecord, default_kind: SourceKind, batch: &mut ObservationBatch) {
    let (Some(channel), Some(viewer)) = (record.channel, record.viewer) else {
        batch.malformed += 1;
        return;
    };
    let kind = resolve_source(record.source.as_deref(), default_kind);
    let mut obs = PresenceObservation::new(&channel, &viewer, kind);
    if !obs.is_valid() {
        batch.malformed += 1;
        return;
    }
    obs.observed_at = record.observed_at.as_ref().and_then(parse_timestamp_value);
    obs.window_id = record.window_id;
    batch.observations.push(obs);
}

/// Dispatch a `.json` document: a columnar batch (parallel arrays), a
/// single snapshot object, or an array of snapshots.
fn parse_json_file(path: &Path, default_kind: SourceKind, batch: &mut ObservationBatch) {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read file {}: {}", path.display(), e);
            return;
        }
    };

    let value: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            debug!("Failed to parse JSON in {}: {}", path.display(), e);
            batch.malformed += 1;
            return;
        }
    };

    let is_columnar = value
        .as_object()
        .and_then(|map| map.get("channels"))
        .is_some_and(|channels| channels.is_array());

    if let serde_json::Value::Array(items) = value {
        for item in items {
            ingest_snapshot_value(item, default_kind, batch, path);
        }
    } else if is_columnar {
        match serde_json::from_value::<RawColumns>(value) {
            Ok(columns) => push_columns(columns, default_kind, batch),
            Err(e) => {
                debug!("Bad columnar batch in {}: {}", path.display(), e);
                batch.malformed += 1;
            }
        }
    } else {
        ingest_snapshot_value(value, default_kind, batch, path);
    }
}

fn ingest_snapshot_value(
    value: serde_json::Value,
    default_kind: SourceKind,
    batch: &mut ObservationBatch,
    path: &Path,
) {
    let snapshot: RawSnapshot = match serde_json::from_value(value) {
        Ok(s) => s,
        Err(e) => {
            debug!("Bad snapshot in {}: {}", path.display(), e);
            batch.malformed += 1;
            return;
        }
    };
    push_snapshot(snapshot, default_kind, batch);
}

fn push_snapshot(snapshot: RawSnapshot, default_kind: SourceKind, batch: &mut ObservationBatch) {
    let channel = snapshot
        .channel
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    if channel.is_empty() {
        batch.malformed += 1;
        return;
    }

    let kind = resolve_source(snapshot.source.as_deref(), default_kind);
    let observed_at = snapshot.timestamp.as_ref().and_then(parse_timestamp_value);

    // A snapshot with no chatters still registers the channel.
    batch.metadata.push((
        channel.clone(),
        ChannelMetadata {
            category: snapshot.game_name.filter(|g| !g.is_empty()),
            language: snapshot.language.filter(|l| !l.is_empty()),
            title: snapshot.title.filter(|t| !t.is_empty()),
            viewer_count: snapshot.viewer_count.unwrap_or(0),
            observed_at,
            source: kind,
        },
    ));

    for chatter in &snapshot.chatters {
        let mut obs = PresenceObservation::new(&channel, chatter, kind);
        if !obs.is_valid() {
            batch.malformed += 1;
            continue;
        }
        obs.observed_at = observed_at;
        obs.window_id = snapshot.window_id;
        batch.observations.push(obs);
    }
}

/// Assemble rows across parallel columns. `channels` and `viewers` are
/// required per row; the rest default. Rows past the end of a required
/// column are malformed.
fn push_columns(columns: RawColumns, default_kind: SourceKind, batch: &mut ObservationBatch) {
    let rows = columns.channels.len().max(columns.viewers.len());
    let cell = |col: &Option<Vec<serde_json::Value>>, i: usize| -> Option<serde_json::Value> {
        col.as_ref().and_then(|c| c.get(i)).cloned()
    };

    for i in 0..rows {
        let channel = columns.channels.get(i).and_then(|v| v.as_str());
        let viewer = columns.viewers.get(i).and_then(|v| v.as_str());
        let (Some(channel), Some(viewer)) = (channel, viewer) else {
            batch.malformed += 1;
            continue;
        };

        let source_tag = cell(&columns.sources, i);
        let kind = resolve_source(source_tag.as_ref().and_then(|v| v.as_str()), default_kind);
        let mut obs = PresenceObservation::new(channel, viewer, kind);
        if !obs.is_valid() {
            batch.malformed += 1;
            continue;
        }
        obs.observed_at = cell(&columns.observed_at, i)
            .as_ref()
            .and_then(parse_timestamp_value);
        obs.window_id = cell(&columns.windows, i).and_then(|v| v.as_u64());
        batch.observations.push(obs);
    }
}

/// Header-driven CSV rows: `channel,chatter,viewers,game,language,title,
/// timestamp` in any column order, extra columns ignored. Fields are
/// comma-free by construction (the writer sanitizes them).
fn parse_csv_file(path: &Path, default_kind: SourceKind, batch: &mut ObservationBatch) {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to read file {}: {}", path.display(), e);
            return;
        }
    };

    let reader = std::io::BufReader::new(file);
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(Ok(h)) => h,
        _ => return,
    };
    let columns: HashMap<&str, usize> = header
        .split(',')
        .enumerate()
        .map(|(i, name)| (name.trim(), i))
        .collect();
    let (Some(&channel_col), Some(&chatter_col)) = (columns.get("channel"), columns.get("chatter"))
    else {
        warn!(
            "CSV {} lacks channel/chatter columns, skipping",
            path.display()
        );
        return;
    };
    let field = |row: &[&str], name: &str| -> Option<String> {
        columns
            .get(name)
            .and_then(|&i| row.get(i))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    for line_result in lines {
        let line = match line_result {
            Ok(l) => l,
            Err(_) => continue,
        };
        if line.trim().is_empty() {
            continue;
        }
        let row: Vec<&str> = line.split(',').collect();
        let channel = row.get(channel_col).map(|s| s.trim()).unwrap_or("");
        let chatter = row.get(chatter_col).map(|s| s.trim()).unwrap_or("");
        if channel.is_empty() || chatter.is_empty() {
            batch.malformed += 1;
            continue;
        }

        let kind = resolve_source(field(&row, "source").as_deref(), default_kind);
        let observed_at = field(&row, "timestamp").and_then(|t| parse_timestamp(&t));
        let mut obs = PresenceObservation::new(channel, chatter, kind);
        obs.observed_at = observed_at;
        batch.metadata.push((
            obs.channel.clone(),
            ChannelMetadata {
                category: field(&row, "game"),
                language: field(&row, "language"),
                title: field(&row, "title"),
                viewer_count: field(&row, "viewers")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0),
                observed_at,
                source: kind,
            },
        ));
        batch.observations.push(obs);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    fn record_line(channel: &str, viewer: &str) -> String {
        serde_json::json!({ "channel": channel, "viewer": viewer }).to_string()
    }

    fn read_dir_as_live(dir: &Path) -> ObservationBatch {
        read_source(&ObservationSource::live(dir))
    }

    // ── find_observation_files ────────────────────────────────────────────────

    #[test]
    fn test_find_observation_files_filters_extensions() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.jsonl", "x");
        write_file(dir.path(), "b.json", "x");
        write_file(dir.path(), "c.csv", "x");
        write_file(dir.path(), "notes.txt", "x");

        let files = find_observation_files(dir.path());
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_find_observation_files_recursive_and_sorted() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("vod");
        std::fs::create_dir_all(&sub).unwrap();
        write_file(dir.path(), "b.jsonl", "x");
        write_file(&sub, "a.json", "x");

        let files = find_observation_files(dir.path());
        assert_eq!(files.len(), 2);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["b.jsonl", "a.json"]);
    }

    #[test]
    fn test_find_observation_files_missing_path() {
        let files = find_observation_files(Path::new("/tmp/does-not-exist-atlas-test"));
        assert!(files.is_empty());
    }

    #[test]
    fn test_single_file_source() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "only.jsonl", &record_line("xqc", "alice"));
        let batch = read_source(&ObservationSource::live(path));
        assert_eq!(batch.observations.len(), 1);
        assert_eq!(batch.files_read, 1);
    }

    // ── JSONL records ─────────────────────────────────────────────────────────

    #[test]
    fn test_jsonl_records_basic() {
        let dir = TempDir::new().unwrap();
        let lines = [
            record_line("XQC", "Alice"),
            record_line("shroud", "bob"),
        ]
        .join("\n");
        write_file(dir.path(), "records.jsonl", &lines);

        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.observations.len(), 2);
        assert_eq!(batch.malformed, 0);
        assert_eq!(batch.observations[0].channel, "xqc");
        assert_eq!(batch.observations[0].viewer, "alice");
        assert_eq!(batch.observations[0].source, SourceKind::Live);
    }

    #[test]
    fn test_jsonl_records_aliases_and_window() {
        let dir = TempDir::new().unwrap();
        let line = serde_json::json!({
            "channel_login": "xqc",
            "chatter": "alice",
            "source": "vod",
            "timestamp": "2025-01-01T10:00:00Z",
            "window": 42,
        })
        .to_string();
        write_file(dir.path(), "records.jsonl", &line);

        let batch = read_dir_as_live(dir.path());
        let obs = &batch.observations[0];
        assert_eq!(obs.source, SourceKind::Vod);
        assert_eq!(obs.window_id, Some(42));
        assert!(obs.observed_at.is_some());
    }

    #[test]
    fn test_jsonl_default_kind_applies_when_source_missing() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "records.jsonl", &record_line("xqc", "alice"));

        let batch = read_source(&ObservationSource::vod(dir.path()));
        assert_eq!(batch.observations[0].source, SourceKind::Vod);
    }

    #[test]
    fn test_jsonl_malformed_lines_counted_and_skipped() {
        let dir = TempDir::new().unwrap();
        let content = format!(
            "{}\n{}\n{}\n\n{}",
            "{not valid json{{",
            record_line("xqc", "alice"),
            r#"{"channel":"xqc"}"#,
            serde_json::json!({ "channel": "", "viewer": "bob" }),
        );
        write_file(dir.path(), "records.jsonl", &content);

        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.observations.len(), 1);
        assert_eq!(batch.malformed, 3);
    }

    #[test]
    fn test_epoch_timestamps_accepted() {
        let dir = TempDir::new().unwrap();
        let secs = serde_json::json!({
            "channel": "a", "viewer": "v", "timestamp": 1735732800
        })
        .to_string();
        let millis = serde_json::json!({
            "channel": "b", "viewer": "v", "timestamp": 1735732800000i64
        })
        .to_string();
        write_file(dir.path(), "records.jsonl", &format!("{secs}\n{millis}"));

        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.observations.len(), 2);
        assert_eq!(
            batch.observations[0].observed_at,
            batch.observations[1].observed_at
        );
    }

    // ── JSON snapshots ────────────────────────────────────────────────────────

    #[test]
    fn test_snapshot_expands_chatters() {
        let dir = TempDir::new().unwrap();
        let snapshot = serde_json::json!({
            "channel": "GMHikaru",
            "timestamp": "2025-01-01T10:00:00Z",
            "viewer_count": 12000,
            "game_name": "Chess",
            "language": "en",
            "title": "blitz arena",
            "chatters": ["Alice", "bob", "carol"],
        })
        .to_string();
        write_file(dir.path(), "snap.json", &snapshot);

        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.observations.len(), 3);
        assert!(batch
            .observations
            .iter()
            .all(|o| o.channel == "gmhikaru" && o.observed_at.is_some()));

        assert_eq!(batch.metadata.len(), 1);
        let (channel, meta) = &batch.metadata[0];
        assert_eq!(channel, "gmhikaru");
        assert_eq!(meta.category.as_deref(), Some("Chess"));
        assert_eq!(meta.language.as_deref(), Some("en"));
        assert_eq!(meta.viewer_count, 12000);
    }

    #[test]
    fn test_snapshot_array_and_alias_fields() {
        let dir = TempDir::new().unwrap();
        let snapshots = serde_json::json!([
            { "channel_login": "a", "game": "Dota 2", "viewers": 55, "chatters": ["x"] },
            { "channel": "b", "chatters": [] },
        ])
        .to_string();
        write_file(dir.path(), "snaps.json", &snapshots);

        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.observations.len(), 1);
        // Both snapshots still register channel metadata.
        assert_eq!(batch.metadata.len(), 2);
        assert_eq!(batch.metadata[0].1.category.as_deref(), Some("Dota 2"));
        assert_eq!(batch.metadata[0].1.viewer_count, 55);
    }

    #[test]
    fn test_snapshot_without_channel_is_malformed() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "snap.json",
            &serde_json::json!({ "chatters": ["x"] }).to_string(),
        );
        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.observations.len(), 0);
        assert_eq!(batch.malformed, 1);
    }

    #[test]
    fn test_snapshot_source_tag_overrides_default() {
        let dir = TempDir::new().unwrap();
        let snapshot = serde_json::json!({
            "channel": "a", "_source": "vod", "chatters": ["x"],
        })
        .to_string();
        write_file(dir.path(), "snap.json", &snapshot);

        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.observations[0].source, SourceKind::Vod);
        assert_eq!(batch.metadata[0].1.source, SourceKind::Vod);
    }

    // ── Columnar batches ──────────────────────────────────────────────────────

    #[test]
    fn test_columnar_batch_assembles_rows() {
        let dir = TempDir::new().unwrap();
        let columns = serde_json::json!({
            "channels": ["a", "a", "b"],
            "viewers": ["X", "y", "x"],
            "sources": ["vod", "vod", "live"],
            "observed_at": ["2025-01-01T10:00:00Z", null, "2025-01-01T11:00:00Z"],
            "windows": [1, 2, null],
        })
        .to_string();
        write_file(dir.path(), "batch.json", &columns);

        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.observations.len(), 3);
        assert_eq!(batch.malformed, 0);

        let first = &batch.observations[0];
        assert_eq!(first.channel, "a");
        assert_eq!(first.viewer, "x");
        assert_eq!(first.source, SourceKind::Vod);
        assert_eq!(first.window_id, Some(1));
        assert!(first.observed_at.is_some());

        let second = &batch.observations[1];
        assert!(second.observed_at.is_none());
        assert_eq!(second.window_id, Some(2));
    }

    #[test]
    fn test_columnar_batch_ragged_rows_are_malformed() {
        let dir = TempDir::new().unwrap();
        let columns = serde_json::json!({
            "channels": ["a", "b", "c"],
            "viewers": ["x"],
        })
        .to_string();
        write_file(dir.path(), "batch.json", &columns);

        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.observations.len(), 1);
        assert_eq!(batch.malformed, 2);
    }

    // ── CSV rows ──────────────────────────────────────────────────────────────

    #[test]
    fn test_csv_rows_with_metadata() {
        let dir = TempDir::new().unwrap();
        let csv = "channel,chatter,viewers,game,language,title,timestamp\n\
                   XQC,Alice,50000,Just Chatting,en,reacting,2025-01-01T10:00:00Z\n\
                   xqc,bob,50000,Just Chatting,en,reacting,2025-01-01T10:00:00Z\n";
        write_file(dir.path(), "rows.csv", csv);

        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.observations.len(), 2);
        assert_eq!(batch.observations[0].channel, "xqc");
        assert_eq!(batch.observations[0].viewer, "alice");
        assert_eq!(batch.metadata.len(), 2);
        let meta = &batch.metadata[0].1;
        assert_eq!(meta.category.as_deref(), Some("Just Chatting"));
        assert_eq!(meta.language.as_deref(), Some("en"));
        assert_eq!(meta.viewer_count, 50000);
        assert!(meta.observed_at.is_some());
    }

    #[test]
    fn test_csv_header_order_is_flexible() {
        let dir = TempDir::new().unwrap();
        let csv = "chatter,channel\nalice,xqc\n";
        write_file(dir.path(), "rows.csv", csv);

        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.observations.len(), 1);
        assert_eq!(batch.observations[0].channel, "xqc");
        assert_eq!(batch.observations[0].viewer, "alice");
    }

    #[test]
    fn test_csv_incomplete_rows_are_malformed() {
        let dir = TempDir::new().unwrap();
        let csv = "channel,chatter\nxqc,alice\nxqc\n,bob\n\n";
        write_file(dir.path(), "rows.csv", csv);

        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.observations.len(), 1);
        assert_eq!(batch.malformed, 2);
    }

    #[test]
    fn test_csv_without_required_header_is_skipped() {
        let dir = TempDir::new().unwrap();
        let csv = "stream,user\nxqc,alice\n";
        write_file(dir.path(), "rows.csv", csv);

        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.observations.len(), 0);
        assert_eq!(batch.malformed, 0);
    }

    // ── Mixed directories ─────────────────────────────────────────────────────

    #[test]
    fn test_mixed_directory_reads_every_format() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.jsonl", &record_line("one", "alice"));
        write_file(
            dir.path(),
            "b.json",
            &serde_json::json!({ "channel": "two", "chatters": ["bob"] }).to_string(),
        );
        write_file(dir.path(), "c.csv", "channel,chatter\nthree,carol\n");

        let batch = read_dir_as_live(dir.path());
        assert_eq!(batch.files_read, 3);
        assert_eq!(batch.observations.len(), 3);
        let channels: Vec<_> = batch
            .observations
            .iter()
            .map(|o| o.channel.as_str())
            .collect();
        assert_eq!(channels, vec!["one", "two", "three"]);
    }
}
