//! MCP transport abstraction.

use crate::error::TransportResult;
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use async_trait::async_trait;

/// Transport trait for MCP communication.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for its response.
    async fn request(&self, request: JsonRpcRequest) -> TransportResult<JsonRpcResponse>;

    /// Send a notification (no response expected).
    async fn notify(&self, notification: JsonRpcNotification) -> TransportResult<()>;

    /// Close the transport. Later requests fail as unreachable.
    async fn close(&self);

    /// Check if the transport is still open.
    fn is_connected(&self) -> bool;
}
