//! Authenticating HTTP client for the Treino gym-management API
//!
//! This crate wraps the REST API transport with transparent access-token
//! refresh. When a request fails with HTTP 401 and the server reports
//! `token.expired` or `token.invalid`, the client exchanges the stored refresh
//! token for a new pair and replays the request.
//!
//! # Refresh Protocol
//!
//! 1. No refresh token stored: the session observer is told to sign out and
//!    the original 401 error is returned
//! 2. A refresh is already in flight: the request waits in a FIFO queue
//! 3. Otherwise this request performs the single `POST /auth/refresh`; on
//!    success the new tokens are persisted, installed as the default header,
//!    reported to the observer, and every queued request is replayed with
//!    them; on failure every queued request fails with the same error and the
//!    observer signs out once
//!
//! Any other 401 signs out without refreshing. Non-auth failures with a JSON
//! body become [`ClientError::Api`] carrying the server message.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tr_auth::{AuthenticatingHttpClient, ClientConfig, MemoryCredentialStore, SessionCallbacks};
//!
//! #[tokio::main]
//! async fn main() -> tr_auth::Result<()> {
//!     let config = ClientConfig::with_base_url("https://gym.example.com/api")?;
//!     let client = AuthenticatingHttpClient::new(config, Arc::new(MemoryCredentialStore::new()))?;
//!
//!     let handle = client.register_session_handlers(Arc::new(SessionCallbacks::new(
//!         || println!("Session expired, back to sign-in"),
//!         |_token| println!("Token rotated"),
//!     )))?;
//!
//!     client.set_default_authorization_header("access-token");
//!     let students: serde_json::Value = client.get("/student/all").await?;
//!     println!("{}", students);
//!
//!     handle.unregister();
//!     Ok(())
//! }
//! ```
//!
//! # Credential Storage
//!
//! The client reads and writes tokens only through the [`CredentialStore`] trait.
//!
//! ```
//! use tr_auth::{CredentialStore, Credentials, MemoryCredentialStore};
//!
//! # async fn example() -> tr_auth::Result<()> {
//! let store = MemoryCredentialStore::new();
//! store.save_credentials(&Credentials::new("access", "refresh")).await?;
//!
//! assert_eq!(store.refresh_token().await.as_deref(), Some("refresh"));
//! # Ok(())
//! # }
//! # tokio_test::block_on(example()).unwrap();
//! ```
//!
//! [`FileCredentialStore`] keeps the pair in the platform config directory.
//!
//! # Important Notes
//!
//! - Only one session is live per client instance; clones share the default header
//! - Unregister the previous [`SessionHandle`] before registering new handlers
//! - Tokens are never logged

pub mod client;
pub mod config;
pub mod errors;
pub mod file_store;
pub mod models;
mod refresh;
pub mod session;
pub mod store;

// Re-export main types
pub use client::AuthenticatingHttpClient;
pub use config::{ClientConfig, HttpTimeouts};
pub use errors::{ClientError, Result};
pub use file_store::FileCredentialStore;
pub use reqwest::header::HeaderMap;
pub use reqwest::{Method, StatusCode};
pub use session::{Credentials, SessionCallbacks, SessionHandle, SessionObserver};
pub use store::{CredentialStore, MemoryCredentialStore};
