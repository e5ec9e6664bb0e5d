//! In-memory token store.

use crate::{TokenStore, TokenStoreResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Token store that lives for the duration of the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with tokens.
    pub fn with_tokens<I, K, V>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            tokens: RwLock::new(
                tokens
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, server_key: &str, token: &str) -> TokenStoreResult<()> {
        self.tokens
            .write()
            .await
            .insert(server_key.to_string(), token.to_string());
        Ok(())
    }

    async fn get(&self, server_key: &str) -> TokenStoreResult<Option<String>> {
        Ok(self.tokens.read().await.get(server_key).cloned())
    }

    async fn delete(&self, server_key: &str) -> TokenStoreResult<bool> {
        Ok(self.tokens.write().await.remove(server_key).is_some())
    }

    async fn delete_all(&self) -> TokenStoreResult<()> {
        self.tokens.write().await.clear();
        Ok(())
    }

    async fn all_keys(&self) -> TokenStoreResult<Vec<String>> {
        Ok(self.tokens.read().await.keys().cloned().collect())
    }
}
