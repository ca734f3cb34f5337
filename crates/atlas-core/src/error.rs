use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the viewer atlas.
#[derive(Error, Debug)]
pub enum AtlasError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The expected observation directory does not exist.
    #[error("Data path not found: {}", .0.display())]
    DataPathNotFound(PathBuf),

    /// Graph rows that cannot be assembled into a consistent graph.
    #[error("Graph construction error: {0}")]
    Graph(String),

    /// A configuration value is missing or invalid. Raised before any
    /// computation starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the atlas crates.
pub type Result<T> = std::result::Result<T, AtlasError>;
