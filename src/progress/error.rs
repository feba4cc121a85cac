//! Error types for the progress record module.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProgressError {
    /// Reading an existing record failed.
    #[error("Failed to read progress record {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Appending to a record failed (disk full, permissions, ...).
    #[error("Failed to append to progress record {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Paths are stored one per line, so embedded newlines cannot be represented.
    #[error("Path contains a line break and cannot be recorded: {0:?}")]
    UnrepresentablePath(String),

    #[error("Failed to spawn blocking task: {0}")]
    Spawn(#[from] tokio::task::JoinError),
}
