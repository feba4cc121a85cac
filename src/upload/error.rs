use thiserror::Error;

/// Why a single upload attempt failed.
///
/// Every variant is treated as transient by the pipeline: the attempt is
/// retried with the next bot and in later rounds.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("HTTP {status}: {description}")]
    HttpStatus { status: u16, description: String },

    /// Connection, TLS or body streaming failure. The request URL is
    /// stripped because it embeds the bot token.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),

    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

impl UploadError {
    /// HTTP status code of the failed attempt, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::HttpStatus { status, .. } => Some(*status),
            UploadError::Transport(e) => e.status().map(|s| s.as_u16()),
            UploadError::Read { .. } => None,
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        UploadError::Transport(e.without_url())
    }
}
