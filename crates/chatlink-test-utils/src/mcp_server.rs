//! Mock MCP server.
//!
//! Serves `POST /mcp` with canned `initialize`, `tools/list` and
//! `tools/call` replies, answers notifications with 202, and records every
//! request so tests can assert on what the client sent.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const MCP_PATH: &str = "/mcp";
pub const TOKEN_PATH: &str = "/oauth/token";

/// JSON-RPC success envelope.
pub fn jsonrpc_result(id: impl Into<Value>, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id.into(), "result": result})
}

/// JSON-RPC error envelope.
pub fn jsonrpc_error(id: impl Into<Value>, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id.into(), "error": {"code": code, "message": message}})
}

#[derive(Debug, Clone)]
struct Script {
    server_name: String,
    tools: Vec<Value>,
    results: HashMap<String, Value>,
    reject_initialize: Option<String>,
    reject_tools_list: Option<String>,
    delay: Option<Duration>,
    session_id: Option<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            server_name: "mock-mcp".to_string(),
            tools: Vec::new(),
            results: HashMap::new(),
            reject_initialize: None,
            reject_tools_list: None,
            delay: None,
            session_id: None,
        }
    }
}

struct McpResponder {
    script: Arc<Script>,
}

impl McpResponder {
    fn reply(&self, id: Value, method: &str, params: &Value) -> Value {
        let script = &self.script;
        match method {
            "initialize" => match &script.reject_initialize {
                Some(message) => jsonrpc_error(id, -32602, message),
                None => jsonrpc_result(
                    id,
                    json!({
                        "protocolVersion": "2024-11-05",
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": script.server_name, "version": "1.0.0"}
                    }),
                ),
            },
            "tools/list" => match &script.reject_tools_list {
                Some(message) => jsonrpc_error(id, -32603, message),
                None => jsonrpc_result(id, json!({"tools": script.tools})),
            },
            "tools/call" => {
                let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
                if let Some(result) = script.results.get(name) {
                    jsonrpc_result(id, result.clone())
                } else if script.tools.iter().any(|t| t["name"] == name) {
                    jsonrpc_result(
                        id,
                        json!({"content": [{"type": "text", "text": format!("{name} ok")}]}),
                    )
                } else {
                    jsonrpc_error(id, -32602, &format!("Unknown tool: {name}"))
                }
            }
            other => jsonrpc_error(id, -32601, &format!("Method not found: {other}")),
        }
    }
}

impl Respond for McpResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400).set_body_string("invalid JSON"),
        };

        let mut template = match body.get("id").cloned() {
            None => ResponseTemplate::new(202),
            Some(id) => {
                let method = body.get("method").and_then(Value::as_str).unwrap_or_default();
                let params = body.get("params").cloned().unwrap_or(Value::Null);
                ResponseTemplate::new(200).set_body_json(self.reply(id, method, &params))
            }
        };

        if let Some(session) = &self.script.session_id {
            template = template.insert_header("mcp-session-id", session.as_str());
        }
        if let Some(delay) = self.script.delay {
            template = template.set_delay(delay);
        }
        template
    }
}

enum TokenEndpoint {
    Token(String),
    Raw(u16, String),
}

/// Builder for [`MockMcpServer`].
#[derive(Default)]
pub struct MockMcpServerBuilder {
    script: Script,
    bearer: Option<String>,
    http_status: Option<u16>,
    token_endpoint: Option<TokenEndpoint>,
}

impl MockMcpServerBuilder {
    /// Name reported in `serverInfo`.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.script.server_name = name.into();
        self
    }

    /// Add a tool with a description and input schema.
    pub fn tool(self, name: &str, description: &str, input_schema: Value) -> Self {
        self.tool_json(json!({
            "name": name,
            "description": description,
            "inputSchema": input_schema
        }))
    }

    /// Add a tool definition verbatim.
    pub fn tool_json(mut self, tool: Value) -> Self {
        self.script.tools.push(tool);
        self
    }

    /// Canned `tools/call` result for a tool.
    pub fn tool_result(mut self, name: &str, result: Value) -> Self {
        self.script.results.insert(name.to_string(), result);
        self
    }

    /// Reject requests without `Authorization: Bearer <token>` with 401.
    pub fn require_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Answer `initialize` with a JSON-RPC error.
    pub fn reject_initialize(mut self, message: impl Into<String>) -> Self {
        self.script.reject_initialize = Some(message.into());
        self
    }

    /// Answer `tools/list` with a JSON-RPC error.
    pub fn reject_tools_list(mut self, message: impl Into<String>) -> Self {
        self.script.reject_tools_list = Some(message.into());
        self
    }

    /// Answer every MCP request with this HTTP status and no body.
    pub fn http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.script.delay = Some(delay);
        self
    }

    /// Send `mcp-session-id` on every reply.
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.script.session_id = Some(id.into());
        self
    }

    /// Serve `POST /oauth/token` issuing `access_token`.
    pub fn oauth_token(mut self, access_token: impl Into<String>) -> Self {
        self.token_endpoint = Some(TokenEndpoint::Token(access_token.into()));
        self
    }

    /// Serve `POST /oauth/token` with a raw status and JSON body.
    pub fn oauth_token_response(mut self, status: u16, body: impl Into<String>) -> Self {
        self.token_endpoint = Some(TokenEndpoint::Raw(status, body.into()));
        self
    }

    pub async fn start(self) -> MockMcpServer {
        let server = MockServer::start().await;
        let script = Arc::new(self.script);

        if let Some(endpoint) = self.token_endpoint {
            let template = match endpoint {
                TokenEndpoint::Token(token) => ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": token, "token_type": "Bearer"})),
                TokenEndpoint::Raw(status, body) => {
                    ResponseTemplate::new(status).set_body_raw(body, "application/json")
                }
            };
            Mock::given(method("POST"))
                .and(path(TOKEN_PATH))
                .respond_with(template)
                .mount(&server)
                .await;
        }

        Mock::given(method("DELETE"))
            .and(path(MCP_PATH))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        if let Some(status) = self.http_status {
            Mock::given(method("POST"))
                .and(path(MCP_PATH))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;
        } else if let Some(token) = self.bearer {
            // First mounted match wins.
            Mock::given(method("POST"))
                .and(path(MCP_PATH))
                .and(header("authorization", format!("Bearer {token}").as_str()))
                .respond_with(McpResponder {
                    script: script.clone(),
                })
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(MCP_PATH))
                .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
                .mount(&server)
                .await;
        } else {
            Mock::given(method("POST"))
                .and(path(MCP_PATH))
                .respond_with(McpResponder { script })
                .mount(&server)
                .await;
        }

        MockMcpServer { server }
    }
}

/// A running mock MCP server.
pub struct MockMcpServer {
    server: MockServer,
}

impl MockMcpServer {
    pub fn builder() -> MockMcpServerBuilder {
        MockMcpServerBuilder::default()
    }

    /// Start a server with no tools and no auth.
    pub async fn start() -> Self {
        Self::builder().start().await
    }

    /// MCP endpoint URL.
    pub fn url(&self) -> String {
        format!("{}{MCP_PATH}", self.server.uri())
    }

    /// Server origin, e.g. `http://127.0.0.1:41234`.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    async fn requests_to(&self, request_path: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == request_path)
            .collect()
    }

    /// JSON-RPC bodies received on the MCP endpoint, in order.
    pub async fn received_messages(&self) -> Vec<Value> {
        self.requests_to(MCP_PATH)
            .await
            .iter()
            .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
            .collect()
    }

    /// Methods received on the MCP endpoint, in order.
    pub async fn received_methods(&self) -> Vec<String> {
        self.received_messages()
            .await
            .iter()
            .filter_map(|m| m.get("method").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    /// `(tool name, arguments)` of every `tools/call` received.
    pub async fn tool_calls(&self) -> Vec<(String, Value)> {
        self.received_messages()
            .await
            .into_iter()
            .filter(|m| m["method"] == "tools/call")
            .map(|m| {
                let name = m["params"]["name"].as_str().unwrap_or_default().to_string();
                (name, m["params"]["arguments"].clone())
            })
            .collect()
    }

    /// Form fields of every token request received.
    pub async fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.requests_to(TOKEN_PATH)
            .await
            .iter()
            .map(|r| {
                url::form_urlencoded::parse(&r.body)
                    .into_owned()
                    .collect::<HashMap<_, _>>()
            })
            .collect()
    }
}
