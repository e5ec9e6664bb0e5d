//! File-backed token storage.

use crate::error::{TokenStoreError, TokenStoreResult};
use crate::TokenStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// A token entry as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredToken {
    /// The bearer token.
    pub access_token: String,
    /// When the token was saved.
    pub saved_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            saved_at: Utc::now(),
        }
    }
}

/// Token store persisted as a JSON map of server URL to [`StoredToken`].
///
/// Writes are serialized by a mutex around the read-modify-write cycle so a
/// delete racing a save cannot lose either update.
pub struct FileTokenStore {
    /// Path to the token file.
    path: PathBuf,
    /// In-memory cache of the file contents.
    cache: RwLock<Option<BTreeMap<String, StoredToken>>>,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    /// Create a store at the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined.
    pub fn new() -> TokenStoreResult<Self> {
        let path = crate::default_token_path().ok_or(TokenStoreError::NoDataDir)?;
        Ok(Self::with_path(path))
    }

    /// Create a store with a custom path.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            cache: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the path to the token file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Full entry for a key, including when it was saved.
    pub async fn entry(&self, server_key: &str) -> TokenStoreResult<Option<StoredToken>> {
        Ok(self.all().await?.get(server_key).cloned())
    }

    async fn all(&self) -> TokenStoreResult<BTreeMap<String, StoredToken>> {
        {
            let cache = self.cache.read().await;
            if let Some(data) = &*cache {
                return Ok(data.clone());
            }
        }

        let data = self.read_all().await?;
        *self.cache.write().await = Some(data.clone());
        Ok(data)
    }

    async fn read_all(&self) -> TokenStoreResult<BTreeMap<String, StoredToken>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)?;
        let mut result = BTreeMap::new();

        for (key, value) in raw {
            match serde_json::from_value::<StoredToken>(value) {
                Ok(token) if !token.access_token.is_empty() => {
                    result.insert(key, token);
                }
                Ok(_) => warn!(server = %key, "Skipping empty token entry"),
                Err(e) => warn!(server = %key, error = %e, "Skipping invalid token entry"),
            }
        }

        Ok(result)
    }

    async fn write_all(&self, data: &BTreeMap<String, StoredToken>) -> TokenStoreResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(data)?;
        tokio::fs::write(&self.path, &content).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.path, perms)
                .await
                .map_err(|e| {
                    TokenStoreError::Permissions(format!(
                        "Failed to set permissions on {:?}: {}",
                        self.path, e
                    ))
                })?;
        }

        *self.cache.write().await = None;
        debug!(path = ?self.path, entries = data.len(), "Wrote token file");
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn save(&self, server_key: &str, token: &str) -> TokenStoreResult<()> {
        debug!(server = %server_key, "Saving token");
        let _guard = self.write_lock.lock().await;

        let mut all = self.all().await?;
        all.insert(server_key.to_string(), StoredToken::new(token));
        self.write_all(&all).await
    }

    async fn get(&self, server_key: &str) -> TokenStoreResult<Option<String>> {
        Ok(self
            .all()
            .await?
            .get(server_key)
            .map(|t| t.access_token.clone()))
    }

    async fn delete(&self, server_key: &str) -> TokenStoreResult<bool> {
        debug!(server = %server_key, "Deleting token");
        let _guard = self.write_lock.lock().await;

        let mut all = self.all().await?;
        let existed = all.remove(server_key).is_some();
        if existed {
            self.write_all(&all).await?;
        }
        Ok(existed)
    }

    async fn delete_all(&self) -> TokenStoreResult<()> {
        debug!("Deleting all tokens");
        let _guard = self.write_lock.lock().await;
        self.write_all(&BTreeMap::new()).await
    }

    async fn all_keys(&self) -> TokenStoreResult<Vec<String>> {
        Ok(self.all().await?.into_keys().collect())
    }
}

impl std::fmt::Debug for FileTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTokenStore")
            .field("path", &self.path)
            .finish()
    }
}
