//! Worker loop and the per-task state machine:
//! `Queued -> (Oversized | Attempting) -> (Uploaded | Exhausted)`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::task::{TaskOutcome, UploadTask};
use crate::credentials::CredentialPool;
use crate::progress::ProgressLog;
use crate::retry::{self, Failover, RetryConfig};
use crate::types::MediaCategory;
use crate::upload::Uploader;

/// Per-task policy knobs shared by every worker.
#[derive(Debug, Clone, Copy)]
pub struct TaskPolicy {
    /// Files strictly larger than this many bytes are never attempted.
    pub max_file_size: u64,
    /// Pause after each successful upload.
    pub cooldown: Duration,
    pub retry: RetryConfig,
}

/// Outcome counters for one category.
#[derive(Debug, Default)]
pub struct CategoryStats {
    uploaded: AtomicU64,
    oversized: AtomicU64,
    exhausted: AtomicU64,
    unrecorded: AtomicU64,
    interrupted: AtomicU64,
    attempts: AtomicU64,
}

/// Point-in-time copy of [`CategoryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uploaded: u64,
    pub oversized: u64,
    pub exhausted: u64,
    pub unrecorded: u64,
    pub interrupted: u64,
    pub attempts: u64,
}

impl CategoryStats {
    pub fn record(&self, outcome: &TaskOutcome) {
        let (counter, attempts) = match outcome {
            TaskOutcome::Uploaded { attempts } => (&self.uploaded, *attempts),
            TaskOutcome::Oversized => (&self.oversized, 0),
            TaskOutcome::Exhausted { attempts, .. } => (&self.exhausted, *attempts),
            TaskOutcome::Unrecorded { attempts, .. } => (&self.unrecorded, *attempts),
            TaskOutcome::Interrupted { attempts } => (&self.interrupted, *attempts),
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.attempts.fetch_add(u64::from(attempts), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uploaded: self.uploaded.load(Ordering::Relaxed),
            oversized: self.oversized.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            unrecorded: self.unrecorded.load(Ordering::Relaxed),
            interrupted: self.interrupted.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
        }
    }
}

/// Everything the workers of one category share.
pub struct WorkerContext {
    pub category: MediaCategory,
    pub pool: Arc<CredentialPool>,
    pub uploader: Arc<dyn Uploader>,
    pub progress: Arc<dyn ProgressLog>,
    pub policy: TaskPolicy,
    pub stats: Arc<CategoryStats>,
    pub progress_bar: ProgressBar,
    pub shutdown: CancellationToken,
}

/// Drain `rx` until it is closed and empty, or until shutdown.
pub async fn worker_loop(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    rx: async_channel::Receiver<UploadTask>,
) {
    tracing::debug!(category = %ctx.category, worker_id, "Worker starting");

    loop {
        let task = tokio::select! {
            biased;
            _ = ctx.shutdown.cancelled() => break,
            received = rx.recv() => match received {
                Ok(task) => task,
                Err(_) => break,
            },
        };

        let span = tracing::info_span!(
            "task",
            category = %ctx.category,
            worker_id,
            path = %task.key,
        );
        let outcome = process_task(&ctx, &task).instrument(span).await;
        ctx.stats.record(&outcome);
        ctx.progress_bar.inc(1);
    }

    tracing::debug!(category = %ctx.category, worker_id, "Worker exited");
}

/// Drive one task to a terminal outcome.
pub async fn process_task(ctx: &WorkerContext, task: &UploadTask) -> TaskOutcome {
    let pb = &ctx.progress_bar;

    if task.size > ctx.policy.max_file_size {
        pb.suspend(|| {
            tracing::info!(
                size_mb = task.size / (1024 * 1024),
                limit_mb = ctx.policy.max_file_size / (1024 * 1024),
                "[SKIP] File too large, logged as oversized"
            )
        });
        if let Err(e) = ctx.progress.record_oversized(&task.directory, &task.key).await {
            pb.suspend(|| tracing::error!("Failed to record oversized file: {}", e));
        }
        return TaskOutcome::Oversized;
    }

    let uploader = &ctx.uploader;
    let credentials = ctx.pool.as_slice();
    let total = credentials.len();

    let failover = retry::failover_rounds(
        &ctx.policy.retry,
        credentials,
        &ctx.shutdown,
        move |index, credential, round| async move {
            let result = uploader.upload(task, credential).await;
            match &result {
                Ok(()) => pb.suspend(|| {
                    tracing::info!(
                        round,
                        bot = credential.bot_id(),
                        "[SUCCESS] Uploaded via bot {}/{}",
                        index + 1,
                        total
                    )
                }),
                Err(e) => pb.suspend(|| {
                    tracing::warn!(
                        round,
                        bot = credential.bot_id(),
                        status = e.status(),
                        "[FAIL] Bot {}/{} failed: {}",
                        index + 1,
                        total,
                        e
                    )
                }),
            }
            result
        },
    )
    .await;

    match failover {
        Failover::Succeeded { attempts, .. } => {
            let outcome = match ctx.progress.record_uploaded(&task.directory, &task.key).await {
                Ok(()) => TaskOutcome::Uploaded { attempts },
                Err(e) => {
                    pb.suspend(|| {
                        tracing::error!(
                            "Uploaded but not recorded, will be re-sent next run: {}",
                            e
                        )
                    });
                    TaskOutcome::Unrecorded {
                        attempts,
                        error: e.to_string(),
                    }
                }
            };
            retry::cancellable_sleep(ctx.policy.cooldown, &ctx.shutdown).await;
            outcome
        }
        Failover::Exhausted {
            attempts,
            last_error,
        } => {
            let last_error = last_error.map(|e| e.to_string()).unwrap_or_default();
            pb.suspend(|| {
                tracing::warn!(
                    attempts,
                    "[FAILED] All {} rounds failed: {}",
                    ctx.policy.retry.max_rounds,
                    last_error
                )
            });
            TaskOutcome::Exhausted {
                attempts,
                last_error,
            }
        }
        Failover::Cancelled { attempts } => {
            pb.suspend(|| tracing::info!(attempts, "[STOP] Shutdown before upload finished"));
            TaskOutcome::Interrupted { attempts }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credential;
    use crate::pipeline::testing::{FakeUploader, RecordingProgressLog, Script};

    fn pool(n: usize) -> Arc<CredentialPool> {
        let creds = (1..=n)
            .map(|i| Credential::new(format!("{i}:tok"), "-100"))
            .collect();
        Arc::new(CredentialPool::new(MediaCategory::Photo, creds).unwrap())
    }

    fn context(
        creds: usize,
        max_rounds: u32,
        uploader: Arc<FakeUploader>,
        progress: Arc<RecordingProgressLog>,
    ) -> WorkerContext {
        WorkerContext {
            category: MediaCategory::Photo,
            pool: pool(creds),
            uploader,
            progress,
            policy: TaskPolicy {
                max_file_size: 2000 * 1024 * 1024,
                cooldown: Duration::ZERO,
                retry: RetryConfig {
                    max_rounds,
                    candidate_delay: Duration::ZERO,
                    round_delay: Duration::ZERO,
                },
            },
            stats: Arc::new(CategoryStats::default()),
            progress_bar: ProgressBar::hidden(),
            shutdown: CancellationToken::new(),
        }
    }

    fn task(size: u64) -> UploadTask {
        UploadTask::new("/media/a.jpg".into(), size, MediaCategory::Photo).unwrap()
    }

    #[tokio::test]
    async fn test_oversized_records_once_and_never_attempts() {
        let uploader = Arc::new(FakeUploader::new(Script::AlwaysSucceed));
        let progress = Arc::new(RecordingProgressLog::default());
        let ctx = context(2, 3, uploader.clone(), progress.clone());

        let outcome = process_task(&ctx, &task(2500 * 1024 * 1024)).await;
        assert_eq!(outcome, TaskOutcome::Oversized);
        assert!(uploader.calls().is_empty());
        assert_eq!(progress.oversized(), vec!["/media/a.jpg".to_string()]);
        assert!(progress.uploaded().is_empty());
    }

    #[tokio::test]
    async fn test_size_exactly_at_limit_is_attempted() {
        let uploader = Arc::new(FakeUploader::new(Script::AlwaysSucceed));
        let progress = Arc::new(RecordingProgressLog::default());
        let ctx = context(1, 1, uploader.clone(), progress.clone());

        let outcome = process_task(&ctx, &task(2000 * 1024 * 1024)).await;
        assert_eq!(outcome, TaskOutcome::Uploaded { attempts: 1 });
        assert!(progress.oversized().is_empty());
    }

    #[tokio::test]
    async fn test_first_fails_second_succeeds() {
        let uploader = Arc::new(FakeUploader::new(Script::FailBots(vec!["1".into()])));
        let progress = Arc::new(RecordingProgressLog::default());
        let ctx = context(2, 2, uploader.clone(), progress.clone());

        let outcome = process_task(&ctx, &task(10)).await;
        assert_eq!(outcome, TaskOutcome::Uploaded { attempts: 2 });
        assert_eq!(uploader.bots_tried(), vec!["1", "2"]);
        assert_eq!(progress.uploaded(), vec!["/media/a.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_success_on_kth_bot_stops_trying() {
        let uploader = Arc::new(FakeUploader::new(Script::FailBots(vec![
            "1".into(),
            "2".into(),
        ])));
        let progress = Arc::new(RecordingProgressLog::default());
        let ctx = context(5, 3, uploader.clone(), progress.clone());

        let outcome = process_task(&ctx, &task(10)).await;
        assert_eq!(outcome, TaskOutcome::Uploaded { attempts: 3 });
        assert_eq!(uploader.bots_tried(), vec!["1", "2", "3"]);
        assert_eq!(progress.uploaded().len(), 1);
    }

    #[tokio::test]
    async fn test_all_fail_exhausts_rounds_times_bots() {
        let uploader = Arc::new(FakeUploader::new(Script::AlwaysFail));
        let progress = Arc::new(RecordingProgressLog::default());
        let ctx = context(2, 2, uploader.clone(), progress.clone());

        let outcome = process_task(&ctx, &task(10)).await;
        match outcome {
            TaskOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 4);
                assert!(last_error.contains("503"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(uploader.bots_tried(), vec!["1", "2", "1", "2"]);
        assert!(progress.uploaded().is_empty());
        assert!(progress.oversized().is_empty());
    }

    #[tokio::test]
    async fn test_default_policy_worst_case_attempts() {
        let uploader = Arc::new(FakeUploader::new(Script::AlwaysFail));
        let progress = Arc::new(RecordingProgressLog::default());
        let ctx = context(5, 3, uploader.clone(), progress);

        let outcome = process_task(&ctx, &task(10)).await;
        assert!(matches!(outcome, TaskOutcome::Exhausted { attempts: 15, .. }));
        assert_eq!(uploader.calls().len(), 15);
    }

    #[tokio::test]
    async fn test_record_failure_after_upload_is_unrecorded() {
        let uploader = Arc::new(FakeUploader::new(Script::AlwaysSucceed));
        let progress = Arc::new(RecordingProgressLog::failing_writes());
        let ctx = context(2, 3, uploader.clone(), progress.clone());

        let outcome = process_task(&ctx, &task(10)).await;
        assert!(matches!(outcome, TaskOutcome::Unrecorded { attempts: 1, .. }));
        assert_eq!(uploader.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_between_bots_is_interrupted() {
        let uploader = Arc::new(FakeUploader::new(Script::AlwaysFail));
        let progress = Arc::new(RecordingProgressLog::default());
        let ctx = context(3, 3, uploader.clone(), progress.clone());
        uploader.cancel_on_call(ctx.shutdown.clone());

        let outcome = process_task(&ctx, &task(10)).await;
        assert_eq!(outcome, TaskOutcome::Interrupted { attempts: 1 });
        assert_eq!(uploader.calls().len(), 1);
        assert!(progress.uploaded().is_empty());
    }

    #[tokio::test]
    async fn test_success_is_recorded_even_if_cancelled_mid_attempt() {
        let uploader = Arc::new(FakeUploader::new(Script::AlwaysSucceed));
        let progress = Arc::new(RecordingProgressLog::default());
        let ctx = context(2, 3, uploader.clone(), progress.clone());
        uploader.cancel_on_call(ctx.shutdown.clone());

        let outcome = process_task(&ctx, &task(10)).await;
        assert_eq!(outcome, TaskOutcome::Uploaded { attempts: 1 });
        assert_eq!(progress.uploaded().len(), 1);
    }

    #[tokio::test]
    async fn test_worker_loop_drains_until_closed() {
        let uploader = Arc::new(FakeUploader::new(Script::AlwaysSucceed));
        let progress = Arc::new(RecordingProgressLog::default());
        let ctx = Arc::new(context(1, 1, uploader.clone(), progress.clone()));

        let (tx, rx) = async_channel::unbounded();
        for i in 0..5 {
            tx.try_send(
                UploadTask::new(format!("/m/{i}.jpg").into(), 1, MediaCategory::Photo).unwrap(),
            )
            .unwrap();
        }
        drop(tx);

        worker_loop(0, Arc::clone(&ctx), rx).await;
        assert_eq!(ctx.stats.snapshot().uploaded, 5);
        assert_eq!(progress.uploaded().len(), 5);
        // Single worker preserves enqueue order.
        let expected: Vec<String> = (0..5).map(|i| format!("/m/{i}.jpg")).collect();
        assert_eq!(progress.uploaded(), expected);
    }

    #[tokio::test]
    async fn test_worker_loop_stops_on_shutdown_with_open_queue() {
        let uploader = Arc::new(FakeUploader::new(Script::AlwaysSucceed));
        let progress = Arc::new(RecordingProgressLog::default());
        let ctx = Arc::new(context(1, 1, uploader, progress));
        let (_tx, rx) = async_channel::unbounded::<UploadTask>();

        let handle = tokio::spawn(worker_loop(0, Arc::clone(&ctx), rx));
        ctx.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[test]
    fn test_stats_record_counts_attempts() {
        let stats = CategoryStats::default();
        stats.record(&TaskOutcome::Uploaded { attempts: 2 });
        stats.record(&TaskOutcome::Oversized);
        stats.record(&TaskOutcome::Exhausted {
            attempts: 6,
            last_error: String::new(),
        });
        let snap = stats.snapshot();
        assert_eq!(snap.uploaded, 1);
        assert_eq!(snap.oversized, 1);
        assert_eq!(snap.exhausted, 1);
        assert_eq!(snap.attempts, 8);
        assert_eq!(snap.interrupted, 0);
    }
}
