use std::fmt;

/// Media class a file belongs to. Each category owns its own queue,
/// worker pool and bot pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCategory {
    Photo,
    Video,
}

impl MediaCategory {
    pub const ALL: [MediaCategory; 2] = [MediaCategory::Photo, MediaCategory::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Photo => "photo",
            MediaCategory::Video => "video",
        }
    }

    /// Prefix used for the category's environment variables
    /// (`PHOTO_BOT_TOKEN_1`, `VIDEO_CHAT_ID`, ...).
    pub fn env_prefix(&self) -> &'static str {
        match self {
            MediaCategory::Photo => "PHOTO",
            MediaCategory::Video => "VIDEO",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
