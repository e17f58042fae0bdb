use std::sync::{Arc, RwLock};

use crate::errors::{ClientError, Result};
use crate::session::Credentials;

/// Trait for persisting the signed-in user's access and refresh tokens
///
/// Reads return `None` both when nothing is stored and when the backend fails;
/// implementations log the failure. The client treats a missing refresh token
/// as a terminal session failure.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn access_token(&self) -> Option<String>;

    async fn refresh_token(&self) -> Option<String>;

    async fn save_access_token(&self, token: &str) -> Result<()>;

    async fn save_refresh_token(&self, token: &str) -> Result<()>;

    async fn remove_access_token(&self) -> Result<()>;

    async fn remove_refresh_token(&self) -> Result<()>;

    /// Both tokens, if both are stored
    async fn credentials(&self) -> Option<Credentials> {
        let access_token = self.access_token().await?;
        let refresh_token = self.refresh_token().await?;
        Some(Credentials {
            access_token,
            refresh_token,
        })
    }

    /// Save both tokens. If the refresh token cannot be saved the previous
    /// access token is put back, so the stored pair never mixes generations.
    async fn save_credentials(&self, credentials: &Credentials) -> Result<()> {
        let previous = self.access_token().await;
        self.save_access_token(&credentials.access_token).await?;

        if let Err(e) = self.save_refresh_token(&credentials.refresh_token).await {
            let restored = match previous {
                Some(token) => self.save_access_token(&token).await,
                None => self.remove_access_token().await,
            };
            if let Err(rollback) = restored {
                tracing::error!("Failed to restore previous access token: {}", rollback);
            }
            return Err(e);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.remove_access_token().await?;
        self.remove_refresh_token().await
    }
}

#[derive(Debug, Default)]
struct Slots {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// In-memory credential store for testing and simple use cases
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slots: Arc<RwLock<Slots>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a token pair
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            slots: Arc::new(RwLock::new(Slots {
                access_token: Some(credentials.access_token),
                refresh_token: Some(credentials.refresh_token),
            })),
        }
    }

    fn write(&self, update: impl FnOnce(&mut Slots)) -> Result<()> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| ClientError::InvalidResponse("Lock poisoned".to_string()))?;
        update(&mut slots);
        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn access_token(&self) -> Option<String> {
        self.slots.read().ok()?.access_token.clone()
    }

    async fn refresh_token(&self) -> Option<String> {
        self.slots.read().ok()?.refresh_token.clone()
    }

    async fn save_access_token(&self, token: &str) -> Result<()> {
        self.write(|s| s.access_token = Some(token.to_string()))
    }

    async fn save_refresh_token(&self, token: &str) -> Result<()> {
        self.write(|s| s.refresh_token = Some(token.to_string()))
    }

    async fn remove_access_token(&self) -> Result<()> {
        self.write(|s| s.access_token = None)
    }

    async fn remove_refresh_token(&self) -> Result<()> {
        self.write(|s| s.refresh_token = None)
    }

    async fn save_credentials(&self, credentials: &Credentials) -> Result<()> {
        self.write(|s| {
            s.access_token = Some(credentials.access_token.clone());
            s.refresh_token = Some(credentials.refresh_token.clone());
        })
    }
}
