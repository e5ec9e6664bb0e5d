//! Tool error types.

use chatlink_mcp::{ConnectionError, TransportError};
use thiserror::Error;

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors that can occur while invoking a bridged tool.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    /// The model supplied arguments the tool cannot use.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The call never produced a tool result.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl ToolError {
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments(message.into())
    }

    /// The transport failure behind this error, if any.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Connection(e) => e.transport(),
            Self::InvalidArguments(_) => None,
        }
    }
}
