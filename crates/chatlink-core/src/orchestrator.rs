//! Connection orchestration across configured MCP servers.
//!
//! The orchestrator connects to every enabled server concurrently,
//! authenticating where a server has an OAuth client, and merges the tools
//! of all connected servers into one list for a chat session. Servers
//! succeed or fail independently.

use crate::config::{ConfigurationProvider, ServerConfiguration};
use crate::error::OrchestratorError;
use crate::session::FailureReporter;
use async_trait::async_trait;
use chatlink_auth::TokenStore;
use chatlink_mcp::{
    ConnectionError, McpConnection, Notifier, OAuthAuthenticator, OAuthClientConfig,
};
use chatlink_tools::{ModelTool, ToolBridge};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Outcome of the last connection attempt for a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Failed(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Aggregate status across the enabled servers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub connected: usize,
    pub failed: usize,
    pub pending: usize,
    pub total: usize,
    pub tool_count: usize,
}

impl ConnectionSummary {
    /// Human-readable status line.
    pub fn status_line(&self) -> String {
        if self.total == 0 {
            return "No MCP servers configured".to_string();
        }
        if self.connected == self.total {
            return format!(
                "All {} servers connected ({} tools)",
                self.total, self.tool_count
            );
        }
        if self.failed == self.total {
            return format!("All {} servers failed to connect", self.total);
        }

        let mut line = format!(
            "{}/{} servers connected ({} tools)",
            self.connected, self.total, self.tool_count
        );
        if self.failed > 0 {
            line.push_str(&format!(", {} failed", self.failed));
        }
        line
    }
}

type ConnectOutcome = Result<(Arc<McpConnection>, Vec<ModelTool>), String>;

/// Runs the single-server connect logic. Cheap to clone into tasks.
#[derive(Clone)]
struct ServerConnector {
    authenticator: Arc<OAuthAuthenticator>,
    store: Arc<dyn TokenStore>,
    bridge: Arc<ToolBridge>,
    notifier: Arc<dyn Notifier>,
}

impl ServerConnector {
    async fn connect(&self, server: &ServerConfiguration) -> ConnectOutcome {
        let connection = Arc::new(
            McpConnection::new(server.display_name(), server.connection_options())
                .with_key(server.url())
                .with_notifier(self.notifier.clone()),
        );

        let result = match server.oauth_client() {
            None => connection.connect(server.url()).await.map(|_| ()).map_err(|e| e.to_string()),
            Some(client) => self.connect_authenticated(&connection, server, &client).await,
        };

        match result {
            Ok(()) => {
                let tools = self.bridge.build_all(&connection).await;
                Ok((connection, tools))
            }
            Err(reason) => {
                warn!(server = %server.url(), error = %reason, "Failed to connect to MCP server");
                self.notifier.notify(&format!(
                    "Failed to connect to {}: {reason}",
                    server.display_name()
                ));
                Err(reason)
            }
        }
    }

    async fn connect_authenticated(
        &self,
        connection: &McpConnection,
        server: &ServerConfiguration,
        client: &OAuthClientConfig,
    ) -> Result<(), String> {
        let url = server.url();

        let cached = match self.store.get(url).await {
            Ok(token) => token,
            Err(e) => {
                warn!(server = %url, error = %e, "Could not read cached token");
                None
            }
        };

        if let Some(token) = cached {
            match connection.connect_with_auth(url, &token).await {
                Ok(_) => return Ok(()),
                Err(e) if is_unreachable(&e) => return Err(e.to_string()),
                Err(e) if is_unauthorized(&e) => {
                    info!(server = %url, "Cached token rejected, signing in again");
                    if let Err(e) = self.store.delete(url).await {
                        warn!(server = %url, error = %e, "Could not delete rejected token");
                    }
                }
                Err(e) => {
                    debug!(server = %url, error = %e, "Connect with cached token failed, trying OAuth");
                }
            }
        }

        let token = self
            .authenticator
            .authenticate(url, client)
            .await
            .map_err(|e| e.to_string())?;

        connection
            .connect_with_auth(url, &token)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

fn is_unreachable(e: &ConnectionError) -> bool {
    e.transport().is_some_and(|t| t.is_unreachable())
}

fn is_unauthorized(e: &ConnectionError) -> bool {
    e.transport().is_some_and(|t| t.is_unauthorized())
}

#[derive(Default)]
struct State {
    statuses: HashMap<String, ConnectionStatus>,
    connections: HashMap<String, Arc<McpConnection>>,
    tools: HashMap<String, Vec<ModelTool>>,
    merged: Arc<Vec<Arc<ModelTool>>>,
}

/// Owns the connections to all configured servers.
pub struct ConnectionOrchestrator {
    servers: Arc<dyn ConfigurationProvider>,
    connector: ServerConnector,
    state: RwLock<State>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    summary_tx: watch::Sender<ConnectionSummary>,
}

impl ConnectionOrchestrator {
    pub fn new(
        servers: Arc<dyn ConfigurationProvider>,
        authenticator: Arc<OAuthAuthenticator>,
        store: Arc<dyn TokenStore>,
        bridge: Arc<ToolBridge>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (summary_tx, _) = watch::channel(ConnectionSummary::default());
        let orchestrator = Self {
            servers,
            connector: ServerConnector {
                authenticator,
                store,
                bridge,
                notifier,
            },
            state: RwLock::new(State::default()),
            locks: Mutex::new(HashMap::new()),
            summary_tx,
        };
        let initial = orchestrator.compute_summary(&State::default());
        orchestrator.summary_tx.send_replace(initial);
        orchestrator
    }

    async fn server_lock(&self, url: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(url.to_string())
            .or_default()
            .clone()
    }

    /// Connect to every enabled server concurrently.
    ///
    /// Existing connections are torn down first. A summary is published
    /// after each server finishes.
    pub async fn connect_to_all_servers(&self) -> ConnectionSummary {
        let servers = self.servers.enabled_servers();
        info!(count = servers.len(), "Connecting to MCP servers");

        let previous: Vec<Arc<McpConnection>> = {
            let mut state = self.state.write().await;
            state.statuses.clear();
            state.tools.clear();
            state.connections.drain().map(|(_, c)| c).collect()
        };
        for connection in previous {
            connection.disconnect().await;
        }
        self.rebuild().await;

        let mut tasks = JoinSet::new();
        for server in servers.iter().cloned() {
            let lock = self.server_lock(server.url()).await;
            let connector = self.connector.clone();
            tasks.spawn(async move {
                let _guard = lock.lock_owned().await;
                let outcome = connector.connect(&server).await;
                (server.url().to_string(), outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((url, outcome)) => {
                    self.record(&url, outcome).await;
                    self.rebuild().await;
                }
                Err(e) => warn!(error = %e, "Connection task did not complete"),
            }
        }

        // A task that panicked never reported; count it as failed.
        {
            let mut state = self.state.write().await;
            for server in &servers {
                state
                    .statuses
                    .entry(server.url().to_string())
                    .or_insert_with(|| ConnectionStatus::Failed("connection task aborted".into()));
            }
        }

        let summary = self.rebuild().await;
        info!(
            connected = summary.connected,
            failed = summary.failed,
            tools = summary.tool_count,
            "{}",
            summary.status_line()
        );
        summary
    }

    /// Reconnect one server without touching the others.
    pub async fn retry_server_connection(
        &self,
        url: &str,
    ) -> Result<ConnectionStatus, OrchestratorError> {
        let server = self
            .servers
            .enabled_servers()
            .into_iter()
            .find(|s| s.url() == url)
            .ok_or_else(|| OrchestratorError::UnknownServer(url.to_string()))?;

        let lock = self.server_lock(url).await;
        let _guard = lock.lock_owned().await;

        self.teardown(url).await;
        self.rebuild().await;

        let outcome = self.connector.connect(&server).await;
        self.record(url, outcome).await;
        self.rebuild().await;

        Ok(self
            .status(url)
            .await
            .unwrap_or_else(|| ConnectionStatus::Failed("not attempted".into())))
    }

    /// Disconnect one server and forget its status.
    pub async fn disconnect_server(&self, url: &str) {
        let lock = self.server_lock(url).await;
        let _guard = lock.lock_owned().await;

        self.teardown(url).await;
        self.rebuild().await;
    }

    pub async fn disconnect_all(&self) {
        let connections: Vec<Arc<McpConnection>> = {
            let mut state = self.state.write().await;
            state.statuses.clear();
            state.tools.clear();
            state.connections.drain().map(|(_, c)| c).collect()
        };
        for connection in connections {
            connection.disconnect().await;
        }
        self.rebuild().await;
    }

    /// Re-mark a server failed after a tool call could not reach it.
    pub async fn mark_failed(&self, url: &str, reason: &str) {
        self.fail_server(url, None, reason).await;
    }

    /// Like [`mark_failed`](Self::mark_failed), but only while `connection`
    /// is still the server's current one. Failures of a connection that a
    /// retry already replaced are ignored.
    pub async fn mark_connection_failed(&self, connection: &Arc<McpConnection>, reason: &str) {
        self.fail_server(connection.key(), Some(connection), reason)
            .await;
    }

    async fn fail_server(
        &self,
        url: &str,
        expected: Option<&Arc<McpConnection>>,
        reason: &str,
    ) {
        let connection = {
            let mut state = self.state.write().await;
            if !state.statuses.contains_key(url) && !state.connections.contains_key(url) {
                debug!(server = %url, "Ignoring failure for server that is not tracked");
                return;
            }
            if let Some(expected) = expected {
                let current = state.connections.get(url);
                if !current.is_some_and(|c| Arc::ptr_eq(c, expected)) {
                    debug!(server = %url, reason, "Ignoring failure of a replaced connection");
                    return;
                }
            }
            state
                .statuses
                .insert(url.to_string(), ConnectionStatus::Failed(reason.to_string()));
            state.tools.remove(url);
            state.connections.remove(url)
        };
        warn!(server = %url, reason, "Marked server failed");
        if let Some(connection) = connection {
            connection.disconnect().await;
        }
        self.rebuild().await;
    }

    /// Tools of all connected servers, in configured order.
    pub async fn merged_tools(&self) -> Vec<Arc<ModelTool>> {
        self.state.read().await.merged.as_ref().clone()
    }

    pub async fn status(&self, url: &str) -> Option<ConnectionStatus> {
        self.state.read().await.statuses.get(url).cloned()
    }

    pub async fn statuses(&self) -> HashMap<String, ConnectionStatus> {
        self.state.read().await.statuses.clone()
    }

    pub async fn connection(&self, url: &str) -> Option<Arc<McpConnection>> {
        self.state.read().await.connections.get(url).cloned()
    }

    pub fn summary(&self) -> ConnectionSummary {
        *self.summary_tx.borrow()
    }

    /// Watch summaries as connections change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSummary> {
        self.summary_tx.subscribe()
    }

    async fn teardown(&self, url: &str) {
        let connection = {
            let mut state = self.state.write().await;
            state.statuses.remove(url);
            state.tools.remove(url);
            state.connections.remove(url)
        };
        if let Some(connection) = connection {
            connection.disconnect().await;
        }
    }

    async fn record(&self, url: &str, outcome: ConnectOutcome) {
        let mut state = self.state.write().await;
        match outcome {
            Ok((connection, tools)) => {
                state
                    .statuses
                    .insert(url.to_string(), ConnectionStatus::Connected);
                state.connections.insert(url.to_string(), connection);
                state.tools.insert(url.to_string(), tools);
            }
            Err(reason) => {
                state
                    .statuses
                    .insert(url.to_string(), ConnectionStatus::Failed(reason));
                state.connections.remove(url);
                state.tools.remove(url);
            }
        }
    }

    /// Rebuild the merged tool list and publish a fresh summary.
    async fn rebuild(&self) -> ConnectionSummary {
        let servers = self.servers.enabled_servers();
        let mut state = self.state.write().await;
        state.merged = Arc::new(merge_tools(&servers, &state.tools));
        let summary = self.compute_summary(&state);
        drop(state);

        self.summary_tx.send_replace(summary);
        summary
    }

    fn compute_summary(&self, state: &State) -> ConnectionSummary {
        let servers = self.servers.enabled_servers();
        let mut summary = ConnectionSummary {
            total: servers.len(),
            tool_count: state.merged.len(),
            ..Default::default()
        };
        for server in &servers {
            match state.statuses.get(server.url()) {
                Some(ConnectionStatus::Connected) => summary.connected += 1,
                Some(ConnectionStatus::Failed(_)) => summary.failed += 1,
                None => summary.pending += 1,
            }
        }
        summary
    }
}

#[async_trait]
impl FailureReporter for ConnectionOrchestrator {
    async fn report_failure(&self, tool: &ModelTool, reason: &str) {
        self.mark_connection_failed(tool.connection(), reason).await;
    }
}

/// Merge per-server tools in server order. A later server's duplicate name
/// is exposed as `<server>__<tool>`, with a `_2`, `_3`, ... suffix if that
/// is taken too.
fn merge_tools(
    servers: &[ServerConfiguration],
    tools: &HashMap<String, Vec<ModelTool>>,
) -> Vec<Arc<ModelTool>> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for server in servers {
        let Some(server_tools) = tools.get(server.url()) else {
            continue;
        };
        for tool in server_tools {
            let tool = if seen.contains(tool.name()) {
                let qualified = unique_name(
                    &seen,
                    format!(
                        "{}__{}",
                        sanitize_server_name(&server.display_name()),
                        tool.remote_name()
                    ),
                );
                warn!(
                    tool = %tool.name(),
                    server = %server.url(),
                    exposed_as = %qualified,
                    "Tool name collision"
                );
                tool.clone().with_name(qualified)
            } else {
                tool.clone()
            };
            seen.insert(tool.name().to_string());
            merged.push(Arc::new(tool));
        }
    }

    merged
}

fn unique_name(seen: &HashSet<String>, base: String) -> String {
    if !seen.contains(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !seen.contains(candidate))
        .unwrap_or(base)
}

fn sanitize_server_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
