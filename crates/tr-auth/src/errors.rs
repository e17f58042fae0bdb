use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by the authenticating client and the credential stores.
///
/// The type is `Clone` so a single refresh failure can be handed to every
/// request queued behind that refresh.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(Arc<reqwest::Error>),

    #[error("HTTP error {status}: {body_snippet}")]
    Http {
        status: StatusCode,
        body_snippet: String,
    },

    #[error("{message}")]
    Api {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },

    #[error("Token refresh timed out after {0:?}")]
    RefreshTimeout(Duration),

    #[error("Token refresh was aborted before it settled")]
    RefreshAborted,

    #[error("Session handlers are already registered - unregister them first")]
    HandlersAlreadyRegistered,

    #[error("Request path must be server-relative: {0}")]
    InvalidPath(String),

    #[error("JSON serialization/deserialization error: {0}")]
    Serde(Arc<serde_json::Error>),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Credential storage is locked by another process")]
    StoreLocked,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// HTTP status of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::Network(e) => e.status(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(Arc::new(e))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(Arc::new(e))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
