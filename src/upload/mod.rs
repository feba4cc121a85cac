//! Single-attempt delivery of one file through one bot.
//!
//! Retry and failover live in the pipeline; an [`Uploader`] only reports
//! whether one attempt succeeded and, if not, why.

pub mod error;
pub mod telegram;

use async_trait::async_trait;

use crate::credentials::Credential;
use crate::pipeline::UploadTask;

pub use error::UploadError;
pub use telegram::TelegramUploader;

#[async_trait]
pub trait Uploader: Send + Sync {
    /// Perform exactly one upload of `task`'s file using `credential`.
    ///
    /// Remote rejections, transport failures and local read errors are all
    /// returned as `Err`; this never panics on I/O.
    async fn upload(&self, task: &UploadTask, credential: &Credential) -> Result<(), UploadError>;
}
