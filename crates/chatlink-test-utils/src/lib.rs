//! Testing utilities, fixtures, and a mock MCP server for chatlink.
//!
//! - **MockMcpServer**: a wiremock-backed MCP endpoint speaking JSON-RPC over
//!   HTTP, with optional bearer auth and an `/oauth/token` endpoint
//! - **Fixtures**: tool definitions, schemas and temporary config directories
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use chatlink_test_utils::{fixtures, MockMcpServer};
//!
//! #[tokio::test]
//! async fn test_discovery() {
//!     let server = MockMcpServer::builder()
//!         .tool_json(fixtures::weather_tool())
//!         .start()
//!         .await;
//!
//!     // point a client at server.url()
//!     assert_eq!(server.received_methods().await, Vec::<String>::new());
//! }
//! ```

pub mod fixtures;
pub mod mcp_server;

pub use fixtures::TestConfigDir;
pub use mcp_server::{jsonrpc_error, jsonrpc_result, MockMcpServer, MockMcpServerBuilder};
