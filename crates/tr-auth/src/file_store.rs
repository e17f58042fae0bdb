use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

use crate::errors::{ClientError, Result};
use crate::session::Credentials;
use crate::store::CredentialStore;

const CREDENTIALS_FILE: &str = "credentials.json";
const LOCK_FILE: &str = "lock";

/// On-disk record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// File-based credential store
///
/// Keeps both tokens in a single JSON file readable only by the owner.
///
/// # Directory Structure
/// ```text
/// ~/.config/treino/tr-auth/
/// ├── credentials.json   # Access and refresh token
/// └── lock               # Advisory lock file
/// ```
#[derive(Debug)]
pub struct FileCredentialStore {
    credentials_file: PathBuf,
    lock_file: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_guard: Mutex<()>,
    /// Last record read from or written to disk
    cache: Arc<RwLock<Option<StoredCredentials>>>,
}

impl FileCredentialStore {
    /// Create a new file-based credential store
    ///
    /// # Arguments
    /// * `storage_dir` - Directory holding the credentials file (e.g., ~/.config/treino/tr-auth)
    pub async fn new(storage_dir: impl AsRef<Path>) -> Result<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();

        fs::create_dir_all(&storage_dir).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&storage_dir, std::fs::Permissions::from_mode(0o700))?;
        }

        Ok(Self {
            credentials_file: storage_dir.join(CREDENTIALS_FILE),
            lock_file: storage_dir.join(LOCK_FILE),
            write_guard: Mutex::new(()),
            cache: Arc::new(RwLock::new(None)),
        })
    }

    /// Get default storage directory for the current platform
    pub fn default_storage_dir() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("", "", "treino").ok_or_else(|| {
            ClientError::Config("Could not determine config directory".to_string())
        })?;

        Ok(project_dirs.config_dir().join("tr-auth"))
    }

    /// Acquire an exclusive lock on the storage
    fn acquire_lock(&self) -> Result<std::fs::File> {
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_file)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| ClientError::StoreLocked)?;

        Ok(lock_file)
    }

    async fn load_from_disk(&self) -> Result<StoredCredentials> {
        if !self.credentials_file.exists() {
            return Ok(StoredCredentials::default());
        }

        let content = fs::read_to_string(&self.credentials_file).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn save_to_disk(&self, record: &StoredCredentials) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;

        // Atomic write: write to temp file, then rename
        let temp_path = self.credentials_file.with_extension("tmp");
        fs::write(&temp_path, json).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let file = std::fs::File::open(&temp_path)?;
        file.sync_all()?;

        fs::rename(&temp_path, &self.credentials_file).await?;
        Ok(())
    }

    async fn read(&self) -> Option<StoredCredentials> {
        if let Some(record) = self.cache.read().await.as_ref() {
            return Some(record.clone());
        }

        match self.load_from_disk().await {
            Ok(record) => {
                *self.cache.write().await = Some(record.clone());
                Some(record)
            }
            Err(e) => {
                tracing::error!("Failed to load credentials: {}", e);
                None
            }
        }
    }

    async fn update(&self, apply: impl FnOnce(&mut StoredCredentials) + Send) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let _lock = self.acquire_lock()?;

        let mut record = match self.load_from_disk().await {
            Ok(record) => record,
            Err(ClientError::Serde(e)) => {
                tracing::warn!("Overwriting unreadable credentials file: {}", e);
                StoredCredentials::default()
            }
            Err(e) => return Err(e),
        };
        apply(&mut record);
        record.updated_at = Some(Utc::now());

        if record.access_token.is_none() && record.refresh_token.is_none() {
            if self.credentials_file.exists() {
                fs::remove_file(&self.credentials_file).await?;
            }
            *self.cache.write().await = Some(StoredCredentials::default());
            return Ok(());
        }

        self.save_to_disk(&record).await?;
        *self.cache.write().await = Some(record);
        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for FileCredentialStore {
    async fn access_token(&self) -> Option<String> {
        self.read().await?.access_token
    }

    async fn refresh_token(&self) -> Option<String> {
        self.read().await?.refresh_token
    }

    async fn save_access_token(&self, token: &str) -> Result<()> {
        let token = token.to_string();
        self.update(move |r| r.access_token = Some(token)).await
    }

    async fn save_refresh_token(&self, token: &str) -> Result<()> {
        let token = token.to_string();
        self.update(move |r| r.refresh_token = Some(token)).await
    }

    async fn remove_access_token(&self) -> Result<()> {
        self.update(|r| r.access_token = None).await
    }

    async fn remove_refresh_token(&self) -> Result<()> {
        self.update(|r| r.refresh_token = None).await
    }

    async fn save_credentials(&self, credentials: &Credentials) -> Result<()> {
        let credentials = credentials.clone();
        self.update(move |r| {
            r.access_token = Some(credentials.access_token);
            r.refresh_token = Some(credentials.refresh_token);
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.update(|r| {
            r.access_token = None;
            r.refresh_token = None;
        })
        .await
    }
}
