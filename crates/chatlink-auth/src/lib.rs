//! Bearer token storage for chatlink.
//!
//! Access tokens obtained through OAuth are keyed by the MCP server URL and
//! kept behind the [`TokenStore`] trait. Two implementations ship with the
//! crate:
//!
//! - [`FileTokenStore`]: a JSON file in the platform data directory,
//!   created with `0600` permissions on Unix
//! - [`MemoryTokenStore`]: process-local, used by tests and one-shot runs
//!
//! # Storage Location
//!
//! - Linux: `~/.local/share/chatlink/tokens.json`
//! - macOS: `~/Library/Application Support/chatlink/tokens.json`
//! - Windows: `%APPDATA%/chatlink/tokens.json`
//!
//! # Example
//!
//! ```no_run
//! use chatlink_auth::{FileTokenStore, TokenStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FileTokenStore::new()?;
//!     store.save("https://mcp.example.com/mcp", "token").await?;
//!
//!     if let Some(token) = store.get("https://mcp.example.com/mcp").await? {
//!         println!("cached token has {} chars", token.len());
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod memory;
mod storage;

pub use error::{TokenStoreError, TokenStoreResult};
pub use memory::MemoryTokenStore;
pub use storage::{FileTokenStore, StoredToken};

use async_trait::async_trait;

/// Keyed store for bearer tokens.
///
/// Keys are server identities (the endpoint URL). Reads may run
/// concurrently; implementations serialize writes.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Save a token, replacing any previous one for the key.
    async fn save(&self, server_key: &str, token: &str) -> TokenStoreResult<()>;

    /// Get the token for a key.
    async fn get(&self, server_key: &str) -> TokenStoreResult<Option<String>>;

    /// Delete the token for a key. Returns `true` if one existed.
    async fn delete(&self, server_key: &str) -> TokenStoreResult<bool>;

    /// Delete every stored token.
    async fn delete_all(&self) -> TokenStoreResult<()>;

    /// Whether a token exists for the key.
    async fn has_token(&self, server_key: &str) -> TokenStoreResult<bool> {
        Ok(self.get(server_key).await?.is_some())
    }

    /// All keys with a stored token, sorted.
    async fn all_keys(&self) -> TokenStoreResult<Vec<String>>;
}

/// Default token file path for the current platform.
pub fn default_token_path() -> Option<std::path::PathBuf> {
    chatlink_util::paths::data_dir().map(|p| p.join("tokens.json"))
}
