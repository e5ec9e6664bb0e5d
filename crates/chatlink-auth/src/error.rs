//! Error types for token storage.

use thiserror::Error;

/// Errors that can occur while reading or writing tokens.
#[derive(Debug, Error)]
pub enum TokenStoreError {
    /// Failed to read or write the token file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize token data.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Could not determine the data directory.
    #[error("Could not determine data directory")]
    NoDataDir,

    /// Failed to set file permissions.
    #[error("Failed to set file permissions: {0}")]
    Permissions(String),
}

/// Result type for token store operations.
pub type TokenStoreResult<T> = Result<T, TokenStoreError>;
