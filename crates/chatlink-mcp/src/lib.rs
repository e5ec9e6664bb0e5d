//! Model Context Protocol (MCP) client for chatlink.
//!
//! Connects to remote MCP servers over HTTP, signs in with OAuth when a
//! server needs it, and exposes the discovered tools.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  POST JSON-RPC  ┌───────────────┐
//! │ McpConnection│────────────────▶│  MCP server   │
//! │              │◀────────────────│ (JSON or SSE) │
//! └──────┬───────┘                 └───────┬───────┘
//!        │ token                           │ /oauth/authorize, /oauth/token
//! ┌──────┴──────────────┐  browser  ┌──────┴───────┐
//! │ OAuthAuthenticator  │──────────▶│ Loopback     │
//! │ (+ TokenStore)      │◀──────────│ callback     │
//! └─────────────────────┘           └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use chatlink_mcp::{ConnectionOptions, McpConnection, Value};
//! use std::collections::BTreeMap;
//!
//! # async fn example() -> Result<(), chatlink_mcp::McpError> {
//! let connection = McpConnection::new("weather", ConnectionOptions::default());
//! let tools = connection.connect("https://weather.example.com/mcp").await?;
//! println!("{} tools", tools.len());
//!
//! let mut args = BTreeMap::new();
//! args.insert("city".to_string(), Value::from("Tokyo"));
//! let outcome = connection.call_tool("get_forecast", &args).await?;
//! println!("{}", outcome.content);
//! # Ok(())
//! # }
//! ```

pub mod callback;
mod client;
mod error;
pub mod http;
pub mod notify;
pub mod oauth;
pub mod protocol;
pub mod schema;
mod transport;
mod value;

pub use callback::{LoopbackAuthorizationAgent, CALLBACK_PATH, DEFAULT_CALLBACK_PORT};
pub use client::{extract_text, ConnectionOptions, McpConnection, ToolOutcome};
pub use error::{
    AuthError, ConnectionError, McpError, McpResult, TransportError, TransportResult,
};
pub use http::{HttpTransport, HttpTransportConfig, TokenPlacement};
pub use notify::{Notifier, NoopNotifier};
pub use oauth::{AuthPhase, AuthorizationAgent, OAuthAuthenticator, OAuthClientConfig};
pub use protocol::{McpTool, ServerInfo};
pub use schema::{FieldSchema, InputSchema};
pub use transport::Transport;
pub use value::{Conversion, Value};
