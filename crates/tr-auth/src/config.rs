use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::errors::{ClientError, Result};

/// Server endpoints used by the session layer
pub mod endpoints {
    pub const REFRESH: &str = "/auth/refresh";
    pub const SIGN_IN: &str = "/user/signin";
}

/// Error codes the server puts in a 401 body when the access token is unusable
pub mod error_codes {
    pub const TOKEN_EXPIRED: &str = "token.expired";
    pub const TOKEN_INVALID: &str = "token.invalid";
}

pub const DEFAULT_BASE_URL: &str = "http://localhost:3333/api";
pub const DEFAULT_USER_AGENT: &str = "treino";

/// Upper bound for a single refresh call before it counts as failed
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            request: Duration::from_secs(30),
        }
    }
}

/// Configuration for [`AuthenticatingHttpClient`](crate::AuthenticatingHttpClient)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every server-relative request path is appended to
    pub base_url: Url,

    /// HTTP client timeouts
    pub http_timeouts: HttpTimeouts,

    /// Timeout applied to the token refresh call
    pub refresh_timeout: Duration,

    /// Custom user agent (optional)
    pub user_agent: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            http_timeouts: HttpTimeouts::default(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
        }
    }

    /// Parse a base URL string and build a config with default timeouts
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(base_url)?))
    }

    /// Parse a TOML document. Every key is optional.
    ///
    /// ```toml
    /// base_url = "https://gym.example.com/api"
    /// connect_timeout_secs = 10
    /// request_timeout_secs = 30
    /// refresh_timeout_secs = 15
    /// user_agent = "treino"
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ClientError::Config(e.to_string()))?;

        let mut config = match file.base_url {
            Some(url) => Self::with_base_url(&url)?,
            None => Self::default(),
        };

        if let Some(secs) = file.connect_timeout_secs {
            config.http_timeouts.connect = Duration::from_secs(secs);
        }
        if let Some(secs) = file.request_timeout_secs {
            config.http_timeouts.request = Duration::from_secs(secs);
        }
        if let Some(secs) = file.refresh_timeout_secs {
            config.refresh_timeout = Duration::from_secs(secs);
        }
        if file.user_agent.is_some() {
            config.user_agent = file.user_agent;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Get default config file path for the current platform
    pub fn default_path() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("", "", "treino").ok_or_else(|| {
            ClientError::Config("Could not determine config directory".to_string())
        })?;

        Ok(project_dirs.config_dir().join("config.toml"))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("valid default base URL"),
            http_timeouts: HttpTimeouts::default(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    connect_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    refresh_timeout_secs: Option<u64>,
    user_agent: Option<String>,
}
