//! tg-media-uploader: bulk upload of a local photo/video tree to Telegram.
//!
//! Files are classified by extension into photo and video queues, each
//! drained by its own worker pool. Every upload walks that category's bot
//! pool in fixed order for a bounded number of rounds. Progress is kept in
//! flat-text records next to the media, so an interrupted run resumes where
//! it stopped.

#![warn(clippy::all)]

mod classify;
mod cli;
mod config;
mod credentials;
mod discovery;
mod pipeline;
mod progress;
pub mod retry;
mod shutdown;
mod types;
mod upload;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Command;
use pipeline::{Pipeline, PipelineSettings, RunSummary, TaskPolicy};
use progress::TextProgressLog;
use types::MediaCategory;
use upload::TelegramUploader;

/// Run the status command.
async fn run_status(cli: &cli::Cli) -> anyhow::Result<()> {
    let root = config::source_directory(cli.directory.as_deref())?;
    let summaries = discovery::summarize_tree(&root, &TextProgressLog).await;

    if summaries.is_empty() {
        println!("No progress records under {}", root.display());
        println!("Run an upload first.");
        return Ok(());
    }

    println!("Progress records under {}:", root.display());
    println!();
    let (mut uploaded, mut oversized) = (0usize, 0usize);
    for (dir, summary) in &summaries {
        let shown = dir.strip_prefix(&root).unwrap_or(dir);
        let shown = if shown.as_os_str().is_empty() {
            Path::new(".")
        } else {
            shown
        };
        println!(
            "  {:<48} {:>7} uploaded  {:>5} oversized",
            shown.display(),
            summary.uploaded,
            summary.oversized
        );
        uploaded += summary.uploaded;
        oversized += summary.oversized;
    }
    println!();
    println!("Totals:");
    println!("  Directories: {}", summaries.len());
    println!("  Uploaded:    {}", uploaded);
    println!("  Oversized:   {}", oversized);

    Ok(())
}

/// Run the upload command (or its dry run).
async fn run_upload(cli: &cli::Cli) -> anyhow::Result<()> {
    let config = config::Config::from_cli(cli)?;
    tracing::debug!(?config, "Loaded configuration");
    tracing::info!(
        directory = %config.directory.display(),
        workers = config.workers,
        photo_bots = config.photo_pool.len(),
        video_bots = config.video_pool.len(),
        "Starting tg-media-uploader"
    );

    for category in MediaCategory::ALL {
        let mut extensions: Vec<&str> = config
            .classifier
            .extensions(category)
            .iter()
            .map(String::as_str)
            .collect();
        extensions.sort_unstable();
        tracing::debug!(%category, extensions = %extensions.join(","), "Classifying by extension");
    }

    let uploader = TelegramUploader::new(config.api_url.clone(), config.connect_timeout)?;
    let pipeline = Pipeline {
        classifier: config.classifier.clone(),
        photo_pool: Arc::new(config.photo_pool.clone()),
        video_pool: Arc::new(config.video_pool.clone()),
        uploader: Arc::new(uploader),
        progress: Arc::new(TextProgressLog),
        settings: PipelineSettings {
            workers_per_category: config.workers,
            policy: TaskPolicy {
                max_file_size: config.max_file_size,
                cooldown: config.cooldown,
                retry: config.retry(),
            },
        },
    };

    let shutdown_token = shutdown::install_signal_handler();

    if config.dry_run {
        let report = pipeline.dry_run(&config.directory, shutdown_token).await;
        for (category, tasks) in [
            (MediaCategory::Photo, &report.photos),
            (MediaCategory::Video, &report.videos),
        ] {
            for task in tasks {
                let marker = if task.size > config.max_file_size {
                    "oversized"
                } else {
                    "upload"
                };
                tracing::info!(%category, size = task.size, "[DRY RUN] {} {}", marker, task.key);
            }
        }
        tracing::info!("── Dry Run Summary ──");
        if report.discovery.interrupted {
            tracing::info!("  Interrupted before the walk finished");
        }
        tracing::info!(
            "  {} photos, {} videos would be queued",
            report.photos.len(),
            report.videos.len()
        );
        tracing::info!(
            "  {} already uploaded, {} already oversized",
            report.discovery.already_uploaded,
            report.discovery.already_oversized
        );
        tracing::info!("  source: {}", config.directory.display());
        return Ok(());
    }

    let pb = pipeline::create_progress_bar(config.no_progress_bar);
    let summary = pipeline.run(&config.directory, pb, shutdown_token.clone()).await;
    log_summary(&summary);

    if shutdown_token.is_cancelled() {
        tracing::info!("Stopped early on request; rerun to continue");
    }
    Ok(())
}

fn log_summary(summary: &RunSummary) {
    tracing::info!("── Summary ──");
    if summary.discovery.queued() == 0 {
        tracing::info!(
            "  Nothing new to upload ({} already uploaded, {} oversized)",
            summary.discovery.already_uploaded,
            summary.discovery.already_oversized
        );
    }
    for category in MediaCategory::ALL {
        let s = summary.category(category);
        tracing::info!(
            "  {}: {} uploaded, {} oversized, {} failed, {} interrupted ({} attempts)",
            category,
            s.uploaded,
            s.oversized,
            s.exhausted + s.unrecorded,
            s.interrupted,
            s.attempts
        );
    }
    if summary.failed() > 0 {
        tracing::warn!("  {} files were not uploaded; rerun to retry them", summary.failed());
    }
    if summary.discovery.errors > 0 {
        tracing::warn!("  {} files or directories could not be read", summary.discovery.errors);
    }
    tracing::info!("  elapsed: {}", pipeline::format_duration(summary.elapsed));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the environment may already carry everything.
    dotenvy::dotenv().ok();
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    match cli.effective_command() {
        Command::Status => run_status(&cli).await,
        Command::Upload => run_upload(&cli).await,
    }
}
