use thiserror::Error;

use crate::auth::error::AuthError;

/// Typed fetch errors enabling retry classification.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Request to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("Malformed listing from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("Could not authorize request: {0}")]
    Auth(#[from] AuthError),
}

impl FetchError {
    /// Server errors, rate limits and network failures are transient; other
    /// 4xx responses, bad payloads and credential problems are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            FetchError::Transport { .. } => true,
            FetchError::Decode { .. } => false,
            FetchError::Auth(_) => false,
        }
    }
}
