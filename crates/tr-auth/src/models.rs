use serde::{Deserialize, Serialize};

use crate::config::error_codes;

/// POST /auth/refresh request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// POST /auth/refresh response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub token: String,
    pub refresh_token: String,
}

/// Structured error body returned by the API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorPayload {
    /// Parse a response body. Only JSON objects count as a structured payload.
    pub fn parse(body: &str) -> Option<Self> {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value @ serde_json::Value::Object(_)) => serde_json::from_value(value).ok(),
            _ => None,
        }
    }

    /// Whether the server rejected the access token as expired or invalid
    pub fn is_token_failure(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some(error_codes::TOKEN_EXPIRED | error_codes::TOKEN_INVALID)
        )
    }
}
