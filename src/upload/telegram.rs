use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use super::{UploadError, Uploader};
use crate::credentials::Credential;
use crate::pipeline::UploadTask;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Longest raw response body kept in an error message.
const MAX_BODY_IN_ERROR: usize = 512;

/// Error payload returned by the Bot API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    description: Option<String>,
}

/// Sends files as documents through the Telegram Bot API (`sendDocument`).
#[derive(Debug, Clone)]
pub struct TelegramUploader {
    client: Client,
    api_url: String,
}

impl TelegramUploader {
    pub fn new(
        api_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, api_url))
    }

    pub fn with_client(client: Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, credential: &Credential) -> String {
        format!("{}/bot{}/sendDocument", self.api_url, credential.token())
    }
}

#[async_trait]
impl Uploader for TelegramUploader {
    async fn upload(&self, task: &UploadTask, credential: &Credential) -> Result<(), UploadError> {
        let read_err = |source| UploadError::Read {
            path: task.key.clone(),
            source,
        };
        let file = tokio::fs::File::open(&task.path).await.map_err(read_err)?;
        // Size at discovery time may be stale; send what is on disk now.
        let length = file.metadata().await.map_err(read_err)?.len();

        let file_name = task
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        let document = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
            .file_name(file_name);
        let form = Form::new()
            .text("chat_id", credential.chat_id().to_string())
            .part("document", document);

        let response = self
            .client
            .post(self.endpoint(credential))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(UploadError::HttpStatus {
            status: status.as_u16(),
            description: describe_error(&body),
        })
    }
}

/// Prefer the API's `description` field; fall back to a truncated raw body.
fn describe_error(body: &str) -> String {
    if let Ok(ApiErrorBody {
        description: Some(description),
    }) = serde_json::from_str::<ApiErrorBody>(body)
    {
        return description;
    }
    let trimmed = body.trim();
    if trimmed.len() <= MAX_BODY_IN_ERROR {
        return trimmed.to_string();
    }
    let mut end = MAX_BODY_IN_ERROR;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
