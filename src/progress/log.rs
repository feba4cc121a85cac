//! Progress log trait and the flat-text implementation.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::error::ProgressError;

/// File holding the paths already delivered from a directory.
pub const UPLOADED_LOG_NAME: &str = "uploaded_files.txt";

/// File holding the paths skipped because they exceed the size limit.
pub const OVERSIZED_LOG_NAME: &str = "huge_files.txt";

/// Record counts for one directory, used by the `status` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectorySummary {
    pub uploaded: usize,
    pub oversized: usize,
}

impl DirectorySummary {
    pub fn is_empty(&self) -> bool {
        self.uploaded == 0 && self.oversized == 0
    }
}

/// Durable per-directory record of finished work.
///
/// Object-safe so the pipeline can hold an `Arc<dyn ProgressLog>` shared by
/// every worker. Appends for different paths of the same directory may run
/// concurrently; implementations must not lose any of them.
#[async_trait]
pub trait ProgressLog: Send + Sync {
    /// Paths previously confirmed uploaded. A directory without a record
    /// yields an empty set.
    async fn load_uploaded(&self, directory: &Path) -> Result<HashSet<String>, ProgressError>;

    /// Paths previously skipped for size. Same contract as `load_uploaded`.
    async fn load_oversized(&self, directory: &Path) -> Result<HashSet<String>, ProgressError>;

    async fn record_uploaded(&self, directory: &Path, path: &str) -> Result<(), ProgressError>;

    async fn record_oversized(&self, directory: &Path, path: &str) -> Result<(), ProgressError>;

    async fn summarize(&self, directory: &Path) -> Result<DirectorySummary, ProgressError> {
        Ok(DirectorySummary {
            uploaded: self.load_uploaded(directory).await?.len(),
            oversized: self.load_oversized(directory).await?.len(),
        })
    }
}

/// Stores each record as a newline-terminated list of paths in a text file
/// inside the directory it describes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextProgressLog;

impl TextProgressLog {
    pub fn uploaded_path(directory: &Path) -> PathBuf {
        directory.join(UPLOADED_LOG_NAME)
    }

    pub fn oversized_path(directory: &Path) -> PathBuf {
        directory.join(OVERSIZED_LOG_NAME)
    }
}

#[async_trait]
impl ProgressLog for TextProgressLog {
    async fn load_uploaded(&self, directory: &Path) -> Result<HashSet<String>, ProgressError> {
        read_record(&Self::uploaded_path(directory)).await
    }

    async fn load_oversized(&self, directory: &Path) -> Result<HashSet<String>, ProgressError> {
        read_record(&Self::oversized_path(directory)).await
    }

    async fn record_uploaded(&self, directory: &Path, path: &str) -> Result<(), ProgressError> {
        append_line(Self::uploaded_path(directory), path).await
    }

    async fn record_oversized(&self, directory: &Path, path: &str) -> Result<(), ProgressError> {
        append_line(Self::oversized_path(directory), path).await
    }
}

/// A line torn by a crash mid-append may hold invalid UTF-8; it is decoded
/// lossily and simply never matches a real path.
async fn read_record(path: &Path) -> Result<HashSet<String>, ProgressError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(parse_record(&String::from_utf8_lossy(&bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
        Err(e) => Err(ProgressError::Read {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn parse_record(contents: &str) -> HashSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Append one line with a single `O_APPEND` write, then flush it to disk.
///
/// One write per line keeps concurrent appends from interleaving, so no
/// lock is taken around the file.
async fn append_line(record: PathBuf, entry: &str) -> Result<(), ProgressError> {
    if entry.contains(['\n', '\r']) {
        return Err(ProgressError::UnrepresentablePath(entry.to_string()));
    }
    let mut line = String::with_capacity(entry.len() + 1);
    line.push_str(entry);
    line.push('\n');

    tokio::task::spawn_blocking(move || {
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&record)
            .and_then(|mut file| {
                file.write_all(line.as_bytes())?;
                file.sync_data()
            });
        result.map_err(|source| ProgressError::Write {
            path: record,
            source,
        })
    })
    .await?
}
