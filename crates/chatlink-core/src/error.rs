//! Error types for the core crate.

use chatlink_tools::ToolError;
use thiserror::Error;

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON syntax or shape.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Config validation failed.
    #[error("config validation failed: {message}")]
    Validation { message: String },

    /// Environment variable not found during substitution.
    #[error("environment variable not found: {name}")]
    EnvVarNotFound { name: String },

    /// File reference not found during substitution.
    #[error("file reference not found: {path}")]
    FileRefNotFound { path: String },

    /// Could not determine where the config lives.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Connection orchestration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// The URL does not belong to a configured, enabled server.
    #[error("unknown server: {0}")]
    UnknownServer(String),
}

/// Chat session errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    /// The language model failed to produce a turn.
    #[error("model error: {0}")]
    Model(String),

    /// The model kept calling tools past the configured limit.
    #[error("gave up after {0} tool calls without an answer")]
    ToolRoundsExceeded(usize),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),
}

impl SessionError {
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }
}
