//! Scripted fakes for pipeline tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::UploadTask;
use crate::credentials::Credential;
use crate::progress::error::ProgressError;
use crate::progress::ProgressLog;
use crate::upload::{UploadError, Uploader};

pub enum Script {
    AlwaysSucceed,
    AlwaysFail,
    /// Bots with these ids fail, every other bot succeeds.
    FailBots(Vec<String>),
}

/// Uploader that records every attempt as `(path, bot_id)`.
pub struct FakeUploader {
    script: Script,
    calls: Mutex<Vec<(String, String)>>,
    cancel_on_call: Mutex<Option<CancellationToken>>,
}

impl FakeUploader {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
            cancel_on_call: Mutex::new(None),
        }
    }

    /// Cancel `token` from inside the next attempts, as a signal arriving
    /// mid-upload would.
    pub fn cancel_on_call(&self, token: CancellationToken) {
        *self.cancel_on_call.lock().unwrap() = Some(token);
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn bots_tried(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, bot)| bot).collect()
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn upload(&self, task: &UploadTask, credential: &Credential) -> Result<(), UploadError> {
        self.calls
            .lock()
            .unwrap()
            .push((task.key.clone(), credential.bot_id().to_string()));
        if let Some(token) = self.cancel_on_call.lock().unwrap().as_ref() {
            token.cancel();
        }

        let fail = match &self.script {
            Script::AlwaysSucceed => false,
            Script::AlwaysFail => true,
            Script::FailBots(ids) => ids.iter().any(|id| id == credential.bot_id()),
        };
        if fail {
            Err(UploadError::HttpStatus {
                status: 503,
                description: "Service Unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// In-memory progress log that remembers the order of writes.
#[derive(Default)]
pub struct RecordingProgressLog {
    uploaded: Mutex<Vec<(PathBuf, String)>>,
    oversized: Mutex<Vec<(PathBuf, String)>>,
    fail_writes: bool,
}

impl RecordingProgressLog {
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded
            .lock()
            .unwrap()
            .iter()
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn oversized(&self) -> Vec<String> {
        self.oversized
            .lock()
            .unwrap()
            .iter()
            .map(|(_, key)| key.clone())
            .collect()
    }

    fn push(
        &self,
        log: &Mutex<Vec<(PathBuf, String)>>,
        directory: &Path,
        path: &str,
    ) -> Result<(), ProgressError> {
        if self.fail_writes {
            return Err(ProgressError::Write {
                path: directory.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        log.lock()
            .unwrap()
            .push((directory.to_path_buf(), path.to_string()));
        Ok(())
    }
}

fn keys_in(log: &Mutex<Vec<(PathBuf, String)>>, directory: &Path) -> HashSet<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|(dir, _)| dir == directory)
        .map(|(_, key)| key.clone())
        .collect()
}

#[async_trait]
impl ProgressLog for RecordingProgressLog {
    async fn load_uploaded(&self, directory: &Path) -> Result<HashSet<String>, ProgressError> {
        Ok(keys_in(&self.uploaded, directory))
    }

    async fn load_oversized(&self, directory: &Path) -> Result<HashSet<String>, ProgressError> {
        Ok(keys_in(&self.oversized, directory))
    }

    async fn record_uploaded(&self, directory: &Path, path: &str) -> Result<(), ProgressError> {
        self.push(&self.uploaded, directory, path)
    }

    async fn record_oversized(&self, directory: &Path, path: &str) -> Result<(), ProgressError> {
        self.push(&self.oversized, directory, path)
    }
}
