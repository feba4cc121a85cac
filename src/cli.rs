use clap::{Parser, Subcommand};

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "tg-media-uploader",
    version,
    about = "Upload photos and videos from a directory tree to Telegram through a pool of bots"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Source directory to upload from
    #[arg(short = 'd', long, env = "UPLOAD_SOURCE_DIR", global = true)]
    pub directory: Option<String>,

    /// Concurrent workers per media category
    #[arg(long, env = "UPLOAD_WORKERS", default_value_t = 5, global = true)]
    pub workers: usize,

    /// Files larger than this (in MB) are logged as oversized and never sent
    #[arg(long, env = "MAX_FILE_SIZE_MB", default_value_t = 2000, global = true)]
    pub max_file_size_mb: u64,

    /// Seconds to pause after each successful upload
    #[arg(long, env = "UPLOAD_COOLDOWN", default_value_t = 5, global = true)]
    pub cooldown: u64,

    /// Rounds over the whole bot pool before a file is given up on
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3, global = true)]
    pub max_retries: u32,

    /// Seconds to wait between rounds
    #[arg(long, env = "RETRY_DELAY", default_value_t = 5, global = true)]
    pub retry_delay: u64,

    /// Seconds to wait before trying the next bot within a round
    #[arg(long, env = "CREDENTIAL_DELAY", default_value_t = 3, global = true)]
    pub credential_delay: u64,

    /// Highest bot index read from PHOTO_BOT_TOKEN_<i> / VIDEO_BOT_TOKEN_<i>
    #[arg(long, env = "MAX_BOTS", default_value_t = 5, global = true)]
    pub max_bots: usize,

    /// Extensions uploaded as photos (comma-separated, case-insensitive)
    #[arg(
        long,
        env = "PHOTO_EXTENSIONS",
        value_delimiter = ',',
        default_value = "jpg,jpeg,png",
        global = true
    )]
    pub photo_extensions: Vec<String>,

    /// Extensions uploaded as videos (comma-separated, case-insensitive)
    #[arg(
        long,
        env = "VIDEO_EXTENSIONS",
        value_delimiter = ',',
        default_value = "mp4,avi",
        global = true
    )]
    pub video_extensions: Vec<String>,

    /// Bot API base URL (point at a local Bot API server to lift size limits)
    #[arg(
        long,
        env = "TELEGRAM_API_URL",
        default_value = crate::upload::telegram::DEFAULT_API_URL,
        global = true
    )]
    pub api_url: String,

    /// HTTP connect timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    pub connect_timeout: u64,

    /// List files that would be uploaded without uploading or recording anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Disable the progress bar
    #[arg(long, global = true)]
    pub no_progress_bar: bool,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Upload every pending file (default)
    Upload,
    /// Show uploaded and oversized counts per directory
    Status,
}

impl Cli {
    pub fn effective_command(&self) -> Command {
        self.command.unwrap_or(Command::Upload)
    }
}
