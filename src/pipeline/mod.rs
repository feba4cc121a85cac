//! Upload pipeline: discovery feeding two category queues, each drained by
//! its own pool of workers.
//!
//! Discovery and the workers run concurrently. Once discovery returns the
//! queue senders are dropped, which closes both queues; workers exit when
//! their queue is closed and empty, or when shutdown is requested.

pub mod task;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::classify::FileClassifier;
use crate::credentials::CredentialPool;
use crate::discovery::{self, DiscoveryStats};
use crate::progress::ProgressLog;
use crate::types::MediaCategory;
use crate::upload::Uploader;

pub use task::UploadTask;
pub use worker::{CategoryStats, StatsSnapshot, TaskPolicy};

/// Sending half of both category queues.
///
/// Every enqueued task grows the shared progress bar by one, so the bar's
/// length tracks discovery as it goes.
pub struct TaskQueues {
    photo: async_channel::Sender<UploadTask>,
    video: async_channel::Sender<UploadTask>,
    progress_bar: ProgressBar,
}

impl TaskQueues {
    /// Create both queues and return their receivers `(photo, video)`.
    pub fn unbounded(
        progress_bar: ProgressBar,
    ) -> (
        Self,
        async_channel::Receiver<UploadTask>,
        async_channel::Receiver<UploadTask>,
    ) {
        let (photo, photo_rx) = async_channel::unbounded();
        let (video, video_rx) = async_channel::unbounded();
        let queues = Self {
            photo,
            video,
            progress_bar,
        };
        (queues, photo_rx, video_rx)
    }

    /// Route `task` to its category's queue. Returns `false` if that queue
    /// has no receivers left.
    pub fn enqueue(&self, task: UploadTask) -> bool {
        let sender = match task.category {
            MediaCategory::Photo => &self.photo,
            MediaCategory::Video => &self.video,
        };
        match sender.try_send(task) {
            Ok(()) => {
                self.progress_bar.inc_length(1);
                true
            }
            Err(e) => {
                tracing::debug!("Queue rejected task: {}", e);
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub workers_per_category: usize,
    pub policy: TaskPolicy,
}

/// What one run did, per category.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub discovery: DiscoveryStats,
    pub photo: StatsSnapshot,
    pub video: StatsSnapshot,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn category(&self, category: MediaCategory) -> &StatsSnapshot {
        match category {
            MediaCategory::Photo => &self.photo,
            MediaCategory::Video => &self.video,
        }
    }

    /// Tasks that did not reach the uploaded state this run.
    pub fn failed(&self) -> u64 {
        MediaCategory::ALL
            .iter()
            .map(|c| {
                let s = self.category(*c);
                s.exhausted + s.unrecorded
            })
            .sum()
    }
}

/// Files discovery would queue, without uploading anything.
#[derive(Debug, Clone, Default)]
pub struct DryRunReport {
    pub discovery: DiscoveryStats,
    pub photos: Vec<UploadTask>,
    pub videos: Vec<UploadTask>,
}

pub struct Pipeline {
    pub classifier: FileClassifier,
    pub photo_pool: Arc<CredentialPool>,
    pub video_pool: Arc<CredentialPool>,
    pub uploader: Arc<dyn Uploader>,
    pub progress: Arc<dyn ProgressLog>,
    pub settings: PipelineSettings,
}

impl Pipeline {
    fn pool(&self, category: MediaCategory) -> &Arc<CredentialPool> {
        match category {
            MediaCategory::Photo => &self.photo_pool,
            MediaCategory::Video => &self.video_pool,
        }
    }

    /// Upload every eligible, unrecorded file under `root`.
    pub async fn run(
        &self,
        root: &Path,
        progress_bar: ProgressBar,
        shutdown: CancellationToken,
    ) -> RunSummary {
        let started = Instant::now();
        let (queues, photo_rx, video_rx) = TaskQueues::unbounded(progress_bar.clone());
        let photo_stats = Arc::new(CategoryStats::default());
        let video_stats = Arc::new(CategoryStats::default());

        let mut handles = Vec::new();
        for (category, rx, stats) in [
            (MediaCategory::Photo, photo_rx, Arc::clone(&photo_stats)),
            (MediaCategory::Video, video_rx, Arc::clone(&video_stats)),
        ] {
            let ctx = Arc::new(worker::WorkerContext {
                category,
                pool: Arc::clone(self.pool(category)),
                uploader: Arc::clone(&self.uploader),
                progress: Arc::clone(&self.progress),
                policy: self.settings.policy,
                stats,
                progress_bar: progress_bar.clone(),
                shutdown: shutdown.clone(),
            });
            tracing::debug!(
                category = %ctx.pool.category(),
                workers = self.settings.workers_per_category,
                bots = ctx.pool.len(),
                "Starting workers"
            );
            for worker_id in 0..self.settings.workers_per_category {
                handles.push(tokio::spawn(worker::worker_loop(
                    worker_id,
                    Arc::clone(&ctx),
                    rx.clone(),
                )));
            }
        }

        let discovery = discovery::discover(
            root,
            &self.classifier,
            self.progress.as_ref(),
            &queues,
            &shutdown,
        )
        .await;
        drop(queues);

        for result in join_all(handles).await {
            if let Err(e) = result {
                tracing::error!("Worker task failed: {}", e);
            }
        }
        progress_bar.finish_and_clear();

        RunSummary {
            discovery,
            photo: photo_stats.snapshot(),
            video: video_stats.snapshot(),
            elapsed: started.elapsed(),
        }
    }

    /// Run discovery only and collect what would be queued.
    pub async fn dry_run(&self, root: &Path, shutdown: CancellationToken) -> DryRunReport {
        let (queues, photo_rx, video_rx) = TaskQueues::unbounded(ProgressBar::hidden());
        let discovery = discovery::discover(
            root,
            &self.classifier,
            self.progress.as_ref(),
            &queues,
            &shutdown,
        )
        .await;
        drop(queues);

        let drain = |rx: async_channel::Receiver<UploadTask>| {
            std::iter::from_fn(move || rx.try_recv().ok()).collect::<Vec<_>>()
        };
        DryRunReport {
            discovery,
            photos: drain(photo_rx),
            videos: drain(video_rx),
        }
    }
}

/// Create a progress bar with a consistent template. Its length starts at
/// zero and grows as discovery enqueues tasks.
///
/// Hidden when the user passed `--no-progress-bar` or stdout is not a TTY.
pub fn create_progress_bar(no_progress_bar: bool) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .expect("valid template")
        .progress_chars("=> "),
    );
    pb
}

pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
