//! MCP error types.

use chatlink_auth::TokenStoreError;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

/// Network and HTTP failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout or closed transport.
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The body was not a JSON-RPC response.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl TransportError {
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// Whether the server rejected the credentials (401 or 403).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::HttpStatus { status: 401 | 403, .. })
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Unreachable(format!("request timed out: {e}"))
        } else if e.is_connect() {
            Self::Unreachable(format!("connection failed: {e}"))
        } else if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else {
            Self::Unreachable(format!("request failed: {e}"))
        }
    }
}

/// MCP handshake and connection-state failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConnectionError {
    /// The endpoint or HTTP client could not be set up.
    #[error("Failed to create transport: {0}")]
    TransportCreationFailed(String),

    /// The server answered `initialize` with an error.
    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    /// `tools/list` returned an error or never finished paging.
    #[error("Failed to list tools: {0}")]
    ListToolsFailed(String),

    /// Operation requires a live connection.
    #[error("Not connected")]
    NotConnected,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ConnectionError {
    /// The underlying transport error, if any.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

/// OAuth flow failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The user dismissed the browser or the flow was cancelled.
    #[error("Authorization cancelled by user")]
    UserCancelled,

    /// The redirect did not match the request (state mismatch, bad URL).
    #[error("Invalid authorization callback: {0}")]
    InvalidCallback(String),

    #[error("Authorization callback did not include a code")]
    MissingAuthorizationCode,

    /// The authorization server redirected with `error=`.
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Timed out waiting for the authorization callback")]
    CallbackTimeout,

    /// The local redirect listener could not be started.
    #[error("Callback server error: {0}")]
    CallbackServer(String),

    #[error("Failed to open browser: {0}")]
    BrowserLaunch(String),

    /// Token endpoint returned a non-200 status.
    #[error("Token exchange failed (HTTP {status}): {body}")]
    HttpExchangeFailed { status: u16, body: String },

    /// Token endpoint response had no `access_token`.
    #[error("Malformed token response: {0}")]
    MalformedTokenResponse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid server URL: {0}")]
    InvalidServerUrl(String),

    #[error("Token store error: {0}")]
    Store(#[from] TokenStoreError),
}

impl AuthError {
    pub fn invalid_callback(message: impl Into<String>) -> Self {
        Self::InvalidCallback(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }
}

/// Errors that can occur during MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// The transport error behind this failure, looking through connection
    /// errors.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Connection(e) => e.transport(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors: Vec<(McpError, &str)> = vec![
            (
                TransportError::unreachable("timed out").into(),
                "Server unreachable: timed out",
            ),
            (
                TransportError::HttpStatus {
                    status: 500,
                    body: "boom".into(),
                }
                .into(),
                "HTTP 500: boom",
            ),
            (
                TransportError::malformed("not json").into(),
                "Malformed response: not json",
            ),
            (ConnectionError::NotConnected.into(), "Not connected"),
            (
                ConnectionError::HandshakeRejected("bad version".into()).into(),
                "Handshake rejected: bad version",
            ),
            (
                AuthError::UserCancelled.into(),
                "Authorization cancelled by user",
            ),
            (
                AuthError::HttpExchangeFailed {
                    status: 400,
                    body: "invalid_grant".into(),
                }
                .into(),
                "Token exchange failed (HTTP 400): invalid_grant",
            ),
            (
                AuthError::MissingAuthorizationCode.into(),
                "Authorization callback did not include a code",
            ),
        ];

        for (error, expected) in errors {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_is_unauthorized() {
        for status in [401, 403] {
            let err = TransportError::HttpStatus {
                status,
                body: String::new(),
            };
            assert!(err.is_unauthorized());
        }
        let err = TransportError::HttpStatus {
            status: 500,
            body: String::new(),
        };
        assert!(!err.is_unauthorized());
        assert!(!TransportError::unreachable("x").is_unauthorized());
    }

    #[test]
    fn test_transport_lookup_through_connection() {
        let err: McpError = ConnectionError::from(TransportError::unreachable("down")).into();
        assert!(err.transport().unwrap().is_unreachable());

        let err: McpError = ConnectionError::NotConnected.into();
        assert!(err.transport().is_none());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: McpError = json_err.into();
        assert!(matches!(err, McpError::Json(_)));
    }

    #[test]
    fn test_from_store_error() {
        let err: AuthError = TokenStoreError::NoDataDir.into();
        assert!(matches!(err, AuthError::Store(_)));
    }
}
