//! Connection to a single MCP server.

use crate::error::{ConnectionError, TransportError};
use crate::http::{HttpTransport, HttpTransportConfig, TokenPlacement, DEFAULT_TIMEOUT};
use crate::notify::{self, Notifier};
use crate::protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcNotification, JsonRpcRequest,
    ListToolsResult, McpTool, ServerInfo, METHOD_INITIALIZE, METHOD_INITIALIZED,
    METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};
use crate::schema::InputSchema;
use crate::transport::Transport;
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Upper bound on `tools/list` pages followed per discovery.
const MAX_TOOL_PAGES: usize = 32;

/// Transport options applied on every connect.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub placement: TokenPlacement,
    pub streaming: bool,
    pub timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            placement: TokenPlacement::Header,
            streaming: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Text returned by a tool call and whether the tool reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Live state for one MCP server.
///
/// At most one transport is held at a time. Connecting again tears the old
/// one down first. The discovered tool list is swapped as a whole, so
/// readers see either the previous list or the new one.
pub struct McpConnection {
    server: String,
    key: Option<String>,
    options: ConnectionOptions,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    tools: RwLock<Arc<Vec<McpTool>>>,
    server_info: RwLock<Option<ServerInfo>>,
    next_id: AtomicU64,
    notifier: Arc<dyn Notifier>,
}

impl McpConnection {
    /// Create a disconnected connection. `server` labels logs and progress.
    pub fn new(server: impl Into<String>, options: ConnectionOptions) -> Self {
        Self {
            server: server.into(),
            key: None,
            options,
            transport: RwLock::new(None),
            tools: RwLock::new(Arc::new(Vec::new())),
            server_info: RwLock::new(None),
            next_id: AtomicU64::new(1),
            notifier: notify::noop(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Identify the connection by `key` (normally the server URL) rather
    /// than by its label.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Server key, falling back to the label.
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.server)
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Connect without credentials.
    pub async fn connect(&self, endpoint: &str) -> Result<Arc<Vec<McpTool>>, ConnectionError> {
        let config = self.transport_config(endpoint);
        self.open(config).await
    }

    /// Connect with a bearer token attached to every request.
    pub async fn connect_with_auth(
        &self,
        endpoint: &str,
        access_token: &str,
    ) -> Result<Arc<Vec<McpTool>>, ConnectionError> {
        let config = self
            .transport_config(endpoint)
            .with_token(access_token, self.options.placement);
        self.open(config).await
    }

    fn transport_config(&self, endpoint: &str) -> HttpTransportConfig {
        HttpTransportConfig::new(endpoint)
            .streaming(self.options.streaming)
            .timeout(self.options.timeout)
    }

    async fn open(&self, config: HttpTransportConfig) -> Result<Arc<Vec<McpTool>>, ConnectionError> {
        // Tear down first so a failed construction cannot leave the old
        // transport behind.
        self.disconnect().await;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config)?);
        self.connect_transport(transport).await
    }

    /// Run the handshake over an existing transport and discover tools.
    pub async fn connect_transport(
        &self,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<Vec<McpTool>>, ConnectionError> {
        self.disconnect().await;

        info!(server = %self.server, "Connecting to MCP server");
        self.notifier
            .notify(&format!("Connecting to {}...", self.server));

        let info = match self.handshake(transport.as_ref()).await {
            Ok(info) => info,
            Err(e) => {
                transport.close().await;
                return Err(e);
            }
        };

        *self.server_info.write().await = info;
        *self.transport.write().await = Some(transport);

        match self.list_tools().await {
            Ok(tools) => {
                info!(server = %self.server, tool_count = tools.len(), "Connected to MCP server");
                self.notifier.notify(&format!(
                    "Connected to {} ({} tools)",
                    self.server,
                    tools.len()
                ));
                Ok(tools)
            }
            Err(e) => {
                self.disconnect().await;
                Err(e)
            }
        }
    }

    async fn handshake(
        &self,
        transport: &dyn Transport,
    ) -> Result<Option<ServerInfo>, ConnectionError> {
        let params = serde_json::to_value(InitializeParams::default())
            .map_err(|e| ConnectionError::HandshakeRejected(e.to_string()))?;
        let request = JsonRpcRequest::new(self.next_request_id(), METHOD_INITIALIZE, Some(params));

        let result = transport
            .request(request)
            .await?
            .into_result()
            .map_err(|e| ConnectionError::HandshakeRejected(e.message))?;

        let info = match serde_json::from_value::<InitializeResult>(result) {
            Ok(init) => {
                debug!(
                    server = %self.server,
                    protocol_version = %init.protocol_version,
                    server_name = %init.server_info.name,
                    "MCP server initialized"
                );
                Some(init.server_info)
            }
            Err(e) => {
                warn!(server = %self.server, error = %e, "Unrecognized initialize result");
                None
            }
        };

        let notification = JsonRpcNotification::new(METHOD_INITIALIZED, None);
        match transport.notify(notification).await {
            Ok(()) => {}
            Err(e @ TransportError::HttpStatus { .. }) if !e.is_unauthorized() => {
                warn!(server = %self.server, error = %e, "Initialized notification rejected");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(info)
    }

    /// Close the transport and forget discovered tools. Idempotent.
    pub async fn disconnect(&self) {
        let transport = self.transport.write().await.take();
        *self.tools.write().await = Arc::new(Vec::new());
        *self.server_info.write().await = None;

        if let Some(transport) = transport {
            transport.close().await;
            info!(server = %self.server, "Disconnected from MCP server");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.transport
            .read()
            .await
            .as_ref()
            .is_some_and(|t| t.is_connected())
    }

    async fn live_transport(&self) -> Result<Arc<dyn Transport>, ConnectionError> {
        match self.transport.read().await.as_ref() {
            Some(t) if t.is_connected() => Ok(t.clone()),
            _ => Err(ConnectionError::NotConnected),
        }
    }

    /// Fetch the server's tools and replace the stored list.
    ///
    /// The stored list only changes when every page was fetched.
    pub async fn list_tools(&self) -> Result<Arc<Vec<McpTool>>, ConnectionError> {
        let transport = self.live_transport().await?;
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        let mut complete = false;

        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor
                .as_ref()
                .map(|c| serde_json::json!({ "cursor": c }));
            let request = JsonRpcRequest::new(self.next_request_id(), METHOD_TOOLS_LIST, params);

            let result = match transport.request(request).await?.into_result() {
                Ok(result) => result,
                Err(error) => {
                    warn!(
                        server = %self.server,
                        code = error.code,
                        message = %error.message,
                        "Failed to list tools"
                    );
                    return Err(ConnectionError::ListToolsFailed(error.message));
                }
            };

            let page: ListToolsResult = serde_json::from_value(result).map_err(|e| {
                TransportError::malformed(format!("invalid tools/list result: {e}"))
            })?;

            tools.extend(page.tools);
            cursor = page.next_cursor;
            if cursor.is_none() {
                complete = true;
                break;
            }
        }

        if !complete {
            warn!(server = %self.server, pages = MAX_TOOL_PAGES, "Tool listing did not finish");
            return Err(ConnectionError::ListToolsFailed(format!(
                "more than {MAX_TOOL_PAGES} pages"
            )));
        }

        for tool in &tools {
            debug!(server = %self.server, tool = %tool.name, "Discovered MCP tool");
            self.notifier.notify(&format!("Found tool: {}", tool.name));
        }

        let tools = Arc::new(tools);
        *self.tools.write().await = tools.clone();
        Ok(tools)
    }

    /// Last discovered tool list.
    pub async fn tools(&self) -> Arc<Vec<McpTool>> {
        self.tools.read().await.clone()
    }

    /// Description and schema of a discovered tool. Never fails.
    pub async fn tool_details(&self, name: &str) -> Option<(Option<String>, Option<InputSchema>)> {
        self.tools
            .read()
            .await
            .iter()
            .find(|t| t.name == name)
            .map(|t| (t.description.clone(), t.input_schema.clone()))
    }

    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.read().await.clone()
    }

    /// Call a tool.
    ///
    /// A JSON-RPC error reply is a tool failure, not a connection failure,
    /// and comes back as an error outcome. Transport errors propagate.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: &BTreeMap<String, Value>,
    ) -> Result<ToolOutcome, ConnectionError> {
        let transport = self.live_transport().await?;

        debug!(server = %self.server, tool = name, "Calling MCP tool");

        let params = CallToolParams {
            name: name.to_string(),
            arguments: Value::map_to_json(arguments),
        };
        let params = serde_json::to_value(&params)
            .map_err(|e| TransportError::malformed(format!("failed to encode arguments: {e}")))?;
        let request = JsonRpcRequest::new(self.next_request_id(), METHOD_TOOLS_CALL, Some(params));

        match transport.request(request).await?.into_result() {
            Ok(result) => {
                let is_error = result
                    .get("isError")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                Ok(ToolOutcome {
                    content: extract_text(&result),
                    is_error,
                })
            }
            Err(error) => {
                warn!(server = %self.server, tool = name, message = %error.message, "Tool call returned error");
                Ok(ToolOutcome::error(error.message))
            }
        }
    }
}

/// Render a `tools/call` result as text.
///
/// Strings are used verbatim, arrays are joined line by line, objects use
/// their `content` or `text` field and anything else is printed as JSON.
pub fn extract_text(result: &serde_json::Value) -> String {
    use serde_json::Value as Json;

    match result {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        Json::Array(items) => items
            .iter()
            .map(render_content_item)
            .collect::<Vec<_>>()
            .join("\n"),
        Json::Object(obj) => {
            if let Some(content) = obj.get("content") {
                extract_text(content)
            } else if let Some(text) = obj.get("text") {
                extract_text(text)
            } else {
                result.to_string()
            }
        }
        other => other.to_string(),
    }
}

fn render_content_item(item: &serde_json::Value) -> String {
    let Some(obj) = item.as_object() else {
        return extract_text(item);
    };

    let field = |key: &str| obj.get(key).and_then(serde_json::Value::as_str);

    match field("type") {
        Some("text") => field("text").unwrap_or_default().to_string(),
        Some("image") => format!("[image: {}]", field("mimeType").unwrap_or("unknown")),
        Some("resource") => {
            let resource = obj.get("resource");
            let text = resource
                .and_then(|r| r.get("text"))
                .and_then(serde_json::Value::as_str);
            let uri = resource
                .and_then(|r| r.get("uri"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown");
            match text {
                Some(text) => text.to_string(),
                None => format!("[resource: {uri}]"),
            }
        }
        _ => extract_text(item),
    }
}

impl std::fmt::Debug for McpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpConnection")
            .field("server", &self.server)
            .field("options", &self.options)
            .finish()
    }
}
