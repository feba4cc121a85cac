//! Source tree walk that feeds the category queues.
//!
//! Directories are visited depth-first in name order. Each directory's
//! progress records are read once, before any of its files are considered,
//! and files already uploaded or already marked oversized are never queued.
//! Per-entry filesystem errors are logged and skipped; they never abort the
//! walk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::classify::FileClassifier;
use crate::pipeline::{TaskQueues, UploadTask};
use crate::progress::{DirectorySummary, ProgressLog};
use crate::types::MediaCategory;

/// Counters describing one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub directories: u64,
    pub queued_photos: u64,
    pub queued_videos: u64,
    pub already_uploaded: u64,
    pub already_oversized: u64,
    pub ineligible: u64,
    pub errors: u64,
    /// Walk stopped early because of shutdown or closed queues.
    pub interrupted: bool,
}

impl DiscoveryStats {
    pub fn queued(&self) -> u64 {
        self.queued_photos + self.queued_videos
    }
}

/// Immediate contents of one directory, sorted by name.
#[derive(Debug, Default)]
struct Listing {
    files: Vec<PathBuf>,
    subdirs: Vec<PathBuf>,
}

/// List a directory without following symlinked directories. Symlinks to
/// regular files are reported as files.
async fn list_directory(dir: &Path, errors: &mut u64) -> std::io::Result<Listing> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut listing = Listing::default();

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), "Error reading directory entry: {}", e);
                *errors += 1;
                break;
            }
        };
        let path = entry.path();
        let file_type = match entry.file_type().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Cannot determine file type: {}", e);
                *errors += 1;
                continue;
            }
        };
        if file_type.is_dir() {
            listing.subdirs.push(path);
        } else if file_type.is_file() {
            listing.files.push(path);
        } else if file_type.is_symlink() {
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => listing.files.push(path),
                Ok(_) => tracing::debug!(path = %path.display(), "Not following symlink"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Broken symlink: {}", e);
                    *errors += 1;
                }
            }
        }
    }

    listing.files.sort();
    listing.subdirs.sort();
    Ok(listing)
}

/// Both progress records of a directory, or `None` if they could not be
/// read. Unreadable records skip the directory's files rather than risk
/// re-uploading everything in it.
async fn load_records(
    dir: &Path,
    progress: &dyn ProgressLog,
) -> Option<(HashSet<String>, HashSet<String>)> {
    let uploaded = progress.load_uploaded(dir).await;
    let oversized = progress.load_oversized(dir).await;
    match (uploaded, oversized) {
        (Ok(u), Ok(o)) => Some((u, o)),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(dir = %dir.display(), "Skipping files in directory: {}", e);
            None
        }
    }
}

/// Walk `root` and enqueue every eligible file that has no progress record.
pub async fn discover(
    root: &Path,
    classifier: &FileClassifier,
    progress: &dyn ProgressLog,
    queues: &TaskQueues,
    shutdown: &CancellationToken,
) -> DiscoveryStats {
    let mut stats = DiscoveryStats::default();
    let mut pending = vec![root.to_path_buf()];

    'walk: while let Some(dir) = pending.pop() {
        if shutdown.is_cancelled() {
            stats.interrupted = true;
            break;
        }

        let listing = match list_directory(&dir, &mut stats.errors).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), "Cannot list directory: {}", e);
                stats.errors += 1;
                continue;
            }
        };
        stats.directories += 1;
        // Reverse so the stack pops subdirectories in name order.
        pending.extend(listing.subdirs.into_iter().rev());

        let mut records = None;
        for path in listing.files {
            let Some(category) = classifier.classify(&path) else {
                stats.ineligible += 1;
                continue;
            };
            let Some(key) = path.to_str() else {
                tracing::warn!(path = %path.display(), "Skipping path that is not valid UTF-8");
                stats.errors += 1;
                continue;
            };

            if records.is_none() {
                records = Some(load_records(&dir, progress).await);
            }
            let Some(Some((uploaded, oversized))) = &records else {
                stats.errors += 1;
                continue 'walk;
            };
            if uploaded.contains(key) {
                stats.already_uploaded += 1;
                continue;
            }
            if oversized.contains(key) {
                stats.already_oversized += 1;
                continue;
            }

            let size = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta.len(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Cannot stat file: {}", e);
                    stats.errors += 1;
                    continue;
                }
            };
            let Some(task) = UploadTask::new(path, size, category) else {
                stats.errors += 1;
                continue;
            };

            if shutdown.is_cancelled() || !queues.enqueue(task) {
                stats.interrupted = true;
                break 'walk;
            }
            match category {
                MediaCategory::Photo => stats.queued_photos += 1,
                MediaCategory::Video => stats.queued_videos += 1,
            }
        }
    }

    tracing::info!(
        directories = stats.directories,
        photos = stats.queued_photos,
        videos = stats.queued_videos,
        already_uploaded = stats.already_uploaded,
        already_oversized = stats.already_oversized,
        errors = stats.errors,
        "Discovery finished"
    );
    stats
}

/// Record counts for every directory under `root` that has any progress
/// record, in walk order.
pub async fn summarize_tree(
    root: &Path,
    progress: &dyn ProgressLog,
) -> Vec<(PathBuf, DirectorySummary)> {
    let mut summaries = Vec::new();
    let mut errors = 0u64;
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let listing = match list_directory(&dir, &mut errors).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), "Cannot list directory: {}", e);
                continue;
            }
        };
        pending.extend(listing.subdirs.into_iter().rev());

        match progress.summarize(&dir).await {
            Ok(summary) if !summary.is_empty() => summaries.push((dir, summary)),
            Ok(_) => {}
            Err(e) => tracing::warn!(dir = %dir.display(), "Cannot read progress records: {}", e),
        }
    }

    summaries
}
