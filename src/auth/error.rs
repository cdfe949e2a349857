use std::path::PathBuf;

use thiserror::Error;

/// Problems with the credential file itself. These are fatal: nothing
/// downstream can work without a usable client id, secret and account.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("You must supply a credential JSON file at {0}")]
    Missing(PathBuf),

    #[error("Failed to read credential file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid credential file {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Credential field `{0}` is empty")]
    EmptyField(&'static str),
}

/// Errors raised while obtaining or persisting a bearer token.
///
/// An exchange that answers without an `access_token` is deliberately not an
/// error here; the empty grant is stored and the feed API rejects it later.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Token exchange request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to persist credentials to {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
