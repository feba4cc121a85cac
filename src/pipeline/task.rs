use std::path::PathBuf;

use crate::types::MediaCategory;

/// One file's unit of work. Built by discovery, consumed by exactly one
/// worker, dropped once it reaches a terminal [`TaskOutcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub path: PathBuf,
    /// UTF-8 form of `path`, as written to the progress records.
    pub key: String,
    /// Directory whose progress records own this file.
    pub directory: PathBuf,
    pub size: u64,
    pub category: MediaCategory,
}

impl UploadTask {
    /// Returns `None` when the path is not valid UTF-8 (it could not be
    /// recorded faithfully) or has no parent directory.
    pub fn new(path: PathBuf, size: u64, category: MediaCategory) -> Option<Self> {
        let key = path.to_str()?.to_string();
        let directory = path.parent()?.to_path_buf();
        Some(Self {
            path,
            key,
            directory,
            size,
            category,
        })
    }
}

/// Terminal state of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Delivered and recorded as uploaded.
    Uploaded { attempts: u32 },
    /// Larger than the size limit; recorded as oversized, never attempted.
    Oversized,
    /// Every bot failed in every round.
    Exhausted { attempts: u32, last_error: String },
    /// Delivered, but the uploaded record could not be written. The file
    /// will be picked up again next run.
    Unrecorded { attempts: u32, error: String },
    /// Shutdown was requested before the policy finished.
    Interrupted { attempts: u32 },
}
