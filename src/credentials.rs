//! Bot credentials and the per-category pools built from them.

use std::fmt;

use crate::types::MediaCategory;

/// A bot token paired with the chat it delivers to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    chat_id: String,
}

impl Credential {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Bot id part of the token (`123456:ABC...` -> `123456`), safe to log.
    pub fn bot_id(&self) -> &str {
        self.token.split(':').next().unwrap_or("")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("bot_id", &self.bot_id())
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no {0} bots configured (set {prefix}_BOT_TOKEN_1 and {prefix}_CHAT_ID)", prefix = .0.env_prefix())]
    Empty(MediaCategory),

    #[error("{var} is set but no chat id was found ({prefix}_CHAT_ID_{index} or {prefix}_CHAT_ID)")]
    MissingChatId {
        var: String,
        prefix: &'static str,
        index: usize,
    },
}

/// Ordered, immutable list of bots for one category. Workers try them in
/// this order every round.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    category: MediaCategory,
    credentials: Vec<Credential>,
}

impl CredentialPool {
    pub fn new(
        category: MediaCategory,
        credentials: Vec<Credential>,
    ) -> Result<Self, CredentialError> {
        if credentials.is_empty() {
            return Err(CredentialError::Empty(category));
        }
        Ok(Self {
            category,
            credentials,
        })
    }

    /// Build a pool from environment-style variables.
    ///
    /// Tokens are read from `<PREFIX>_BOT_TOKEN_1..=max_bots`; unset or blank
    /// slots are skipped. Each bot delivers to `<PREFIX>_CHAT_ID_<i>` if set,
    /// otherwise to the shared `<PREFIX>_CHAT_ID`.
    pub fn from_lookup<F>(
        category: MediaCategory,
        max_bots: usize,
        lookup: F,
    ) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = category.env_prefix();
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let shared_chat = get(&format!("{prefix}_CHAT_ID"));

        let mut credentials = Vec::new();
        for index in 1..=max_bots {
            let var = format!("{prefix}_BOT_TOKEN_{index}");
            let Some(token) = get(&var) else {
                continue;
            };
            let chat_id = get(&format!("{prefix}_CHAT_ID_{index}"))
                .or_else(|| shared_chat.clone())
                .ok_or(CredentialError::MissingChatId {
                    var,
                    prefix,
                    index,
                })?;
            credentials.push(Credential::new(token, chat_id));
        }

        Self::new(category, credentials)
    }

    pub fn category(&self) -> MediaCategory {
        self.category
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn as_slice(&self) -> &[Credential] {
        &self.credentials
    }
}
