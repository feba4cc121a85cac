use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::classify::FileClassifier;
use crate::cli::Cli;
use crate::credentials::CredentialPool;
use crate::retry::RetryConfig;
use crate::types::MediaCategory;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Validated configuration for an upload run.
pub struct Config {
    pub directory: PathBuf,
    pub api_url: String,
    pub classifier: FileClassifier,
    pub photo_pool: CredentialPool,
    pub video_pool: CredentialPool,

    pub max_file_size: u64,
    pub cooldown: Duration,
    pub retry_delay: Duration,
    pub credential_delay: Duration,
    pub connect_timeout: Duration,

    pub workers: usize,
    pub max_retries: u32,

    pub dry_run: bool,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("directory", &self.directory)
            .field("api_url", &self.api_url)
            .field("photo_bots", &self.photo_pool.len())
            .field("video_bots", &self.video_pool.len())
            .field("max_file_size", &self.max_file_size)
            .field("workers", &self.workers)
            .field("max_retries", &self.max_retries)
            .field("cooldown", &self.cooldown)
            .field("retry_delay", &self.retry_delay)
            .field("credential_delay", &self.credential_delay)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Resolve `--directory` to an existing, canonical directory.
pub fn source_directory(directory: Option<&str>) -> anyhow::Result<PathBuf> {
    let Some(raw) = directory.map(str::trim).filter(|d| !d.is_empty()) else {
        anyhow::bail!("--directory (or UPLOAD_SOURCE_DIR) is required");
    };
    let path = expand_tilde(raw);
    let canonical = path
        .canonicalize()
        .with_context(|| format!("Source directory {} is not accessible", path.display()))?;
    if !canonical.is_dir() {
        anyhow::bail!("Source path {} is not a directory", canonical.display());
    }
    Ok(canonical)
}

impl Config {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        Self::from_cli_with(cli, |name| std::env::var(name).ok())
    }

    /// Build from parsed arguments, reading bot credentials through `lookup`.
    pub fn from_cli_with<F>(cli: &Cli, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if cli.workers == 0 {
            anyhow::bail!("--workers must be at least 1");
        }
        if cli.max_retries == 0 {
            anyhow::bail!("--max-retries must be at least 1");
        }

        let classifier = FileClassifier::new(&cli.photo_extensions, &cli.video_extensions);
        let shared = classifier.overlapping();
        if !shared.is_empty() {
            anyhow::bail!(
                "Extensions listed as both photo and video: {}",
                shared.join(", ")
            );
        }

        let directory = source_directory(cli.directory.as_deref())?;
        let photo_pool = CredentialPool::from_lookup(MediaCategory::Photo, cli.max_bots, &lookup)?;
        let video_pool = CredentialPool::from_lookup(MediaCategory::Video, cli.max_bots, &lookup)?;

        Ok(Self {
            directory,
            api_url: cli.api_url.clone(),
            classifier,
            photo_pool,
            video_pool,
            max_file_size: cli.max_file_size_mb.saturating_mul(BYTES_PER_MB),
            cooldown: Duration::from_secs(cli.cooldown),
            retry_delay: Duration::from_secs(cli.retry_delay),
            credential_delay: Duration::from_secs(cli.credential_delay),
            connect_timeout: Duration::from_secs(cli.connect_timeout),
            workers: cli.workers,
            max_retries: cli.max_retries,
            dry_run: cli.dry_run,
            no_progress_bar: cli.no_progress_bar,
        })
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_rounds: self.max_retries,
            candidate_delay: self.credential_delay,
            round_delay: self.retry_delay,
        }
    }
}
