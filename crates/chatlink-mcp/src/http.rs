//! HTTP transport for remote MCP servers.
//!
//! Every message is an HTTP POST carrying one JSON-RPC object. In streaming
//! mode the client also accepts `text/event-stream` replies and keeps the
//! server's `mcp-session-id` for the life of the transport.

use crate::error::{ConnectionError, TransportError, TransportResult};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::transport::Transport;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// Header carrying the streaming session.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Query parameter used when the token travels in the URL.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the bearer token is attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPlacement {
    /// `Authorization: Bearer <token>`.
    #[default]
    Header,
    /// `?access_token=<token>`, for intermediaries that strip auth headers.
    Query,
}

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub url: String,
    pub token: Option<String>,
    pub placement: TokenPlacement,
    pub streaming: bool,
    pub timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            placement: TokenPlacement::Header,
            streaming: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Attach a bearer token.
    pub fn with_token(mut self, token: impl Into<String>, placement: TokenPlacement) -> Self {
        self.token = Some(token.into());
        self.placement = placement;
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP transport for remote MCP servers.
pub struct HttpTransport {
    config: HttpTransportConfig,
    endpoint: Url,
    client: Client,
    closed: AtomicBool,
    session_id: RwLock<Option<String>>,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(config: HttpTransportConfig) -> Result<Self, ConnectionError> {
        let mut endpoint = Url::parse(&config.url).map_err(|e| {
            ConnectionError::TransportCreationFailed(format!("invalid endpoint {}: {e}", config.url))
        })?;

        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConnectionError::TransportCreationFailed(format!(
                "unsupported scheme: {}",
                endpoint.scheme()
            )));
        }

        if let (Some(token), TokenPlacement::Query) = (&config.token, config.placement) {
            endpoint
                .query_pairs_mut()
                .append_pair(ACCESS_TOKEN_PARAM, token);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ConnectionError::TransportCreationFailed(format!(
                    "failed to create HTTP client: {e}"
                ))
            })?;

        Ok(Self {
            config,
            endpoint,
            client,
            closed: AtomicBool::new(false),
            session_id: RwLock::new(None),
        })
    }

    /// The URL requests are sent to, including a query token if configured.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Session id assigned by a streaming server.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    async fn build_request(&self, body: String) -> reqwest::RequestBuilder {
        let accept = if self.config.streaming {
            "application/json, text/event-stream"
        } else {
            "application/json"
        };

        let mut req = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, accept)
            .body(body);

        if let (Some(token), TokenPlacement::Header) = (&self.config.token, self.config.placement)
        {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        if self.config.streaming {
            if let Some(session) = self.session_id.read().await.as_ref() {
                req = req.header(SESSION_HEADER, session);
            }
        }

        req
    }

    async fn send(&self, body: String) -> TransportResult<Response> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::unreachable("transport closed"));
        }

        let response = self.build_request(body).await.send().await?;

        if self.config.streaming {
            if let Some(session) = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
            {
                *self.session_id.write().await = Some(session.to_string());
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn read_response(&self, id: u64, response: Response) -> TransportResult<JsonRpcResponse> {
        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/event-stream"));

        if is_event_stream {
            return read_event_stream(id, response).await;
        }

        let text = response.text().await?;
        let parsed: JsonRpcResponse = serde_json::from_str(&text)
            .map_err(|e| TransportError::malformed(format!("invalid JSON-RPC response: {e}")))?;

        if !parsed.answers(id) {
            return Err(TransportError::malformed(format!(
                "response id {:?} does not match request {id}",
                parsed.id
            )));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: JsonRpcRequest) -> TransportResult<JsonRpcResponse> {
        let body = serde_json::to_string(&request)
            .map_err(|e| TransportError::malformed(format!("failed to encode request: {e}")))?;

        debug!(id = request.id, method = %request.method, "Sending MCP request");

        let response = self.send(body).await?;
        self.read_response(request.id, response).await
    }

    async fn notify(&self, notification: JsonRpcNotification) -> TransportResult<()> {
        let body = serde_json::to_string(&notification).map_err(|e| {
            TransportError::malformed(format!("failed to encode notification: {e}"))
        })?;

        debug!(method = %notification.method, "Sending MCP notification");

        self.send(body).await.map(|_| ())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Streaming servers keep per-session state; ask them to drop it.
        if let Some(session) = self.session_id.write().await.take() {
            let result = self
                .client
                .delete(self.endpoint.clone())
                .header(SESSION_HEADER, &session)
                .send()
                .await;
            if let Err(e) = result {
                debug!(error = %e, "Session termination request failed");
            }
        }

        debug!(endpoint = %self.config.url, "Closed HTTP transport");
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

/// Read `data:` events until the response to `id` arrives.
async fn read_event_stream(id: u64, response: Response) -> TransportResult<JsonRpcResponse> {
    let mut stream = response.bytes_stream();
    let mut parser = SseParser::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for data in parser.push(&String::from_utf8_lossy(&chunk)) {
            if let Some(found) = match_response(id, &data) {
                return Ok(found);
            }
        }
    }

    for data in parser.finish() {
        if let Some(found) = match_response(id, &data) {
            return Ok(found);
        }
    }

    Err(TransportError::malformed(
        "event stream ended without a response",
    ))
}

fn match_response(id: u64, data: &str) -> Option<JsonRpcResponse> {
    match serde_json::from_str::<JsonRpcResponse>(data) {
        Ok(response) if response.answers(id) => Some(response),
        Ok(_) => None,
        Err(_) => {
            // Server-initiated requests and notifications share the stream.
            warn!(len = data.len(), "Skipping non-response event");
            None
        }
    }
}

/// Incremental `text/event-stream` parser yielding each event's data.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    data: Vec<String>,
}

impl SseParser {
    /// Feed a chunk, returning the data of every event it completes.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(event) = self.take_event() {
                    events.push(event);
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // `event:`, `id:`, `retry:` and comments carry nothing we use.
        }

        events
    }

    /// Flush an event left unterminated at end of stream.
    pub fn finish(&mut self) -> Vec<String> {
        let tail = std::mem::take(&mut self.buffer);
        if let Some(value) = tail.trim_end_matches('\r').strip_prefix("data:") {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        self.take_event().into_iter().collect()
    }

    fn take_event(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data).join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlink_test_utils::{jsonrpc_result, MockMcpServer};
    use serde_json::json;
    use wiremock::matchers::{header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_config_defaults() {
        let config = HttpTransportConfig::new("https://example.com/mcp");
        assert!(config.token.is_none());
        assert_eq!(config.placement, TokenPlacement::Header);
        assert!(config.streaming);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = HttpTransport::new(HttpTransportConfig::new("not a url"))
            .err()
            .unwrap();
        assert!(matches!(err, ConnectionError::TransportCreationFailed(_)));

        let err = HttpTransport::new(HttpTransportConfig::new("ftp://example.com"))
            .err()
            .unwrap();
        assert!(matches!(err, ConnectionError::TransportCreationFailed(_)));
    }

    #[test]
    fn test_query_placement_rewrites_endpoint() {
        let transport = HttpTransport::new(
            HttpTransportConfig::new("https://example.com/mcp?x=1")
                .with_token("t0k", TokenPlacement::Query),
        )
        .unwrap();
        assert_eq!(
            transport.endpoint().as_str(),
            "https://example.com/mcp?x=1&access_token=t0k"
        );
    }

    #[test]
    fn test_header_placement_keeps_endpoint() {
        let transport = HttpTransport::new(
            HttpTransportConfig::new("https://example.com/mcp")
                .with_token("t0k", TokenPlacement::Header),
        )
        .unwrap();
        assert_eq!(transport.endpoint().as_str(), "https://example.com/mcp");
    }

    #[test]
    fn test_sse_parser_events() {
        let mut parser = SseParser::default();
        assert!(parser.push("event: message\ndata: {\"a\"").is_empty());
        let events = parser.push(":1}\n\ndata: second\r\n\r\n");
        assert_eq!(events, vec!["{\"a\":1}", "second"]);
    }

    #[test]
    fn test_sse_parser_multiline_and_finish() {
        let mut parser = SseParser::default();
        assert!(parser.push("data: line1\ndata:line2\n").is_empty());
        assert_eq!(parser.finish(), vec!["line1\nline2"]);

        let mut parser = SseParser::default();
        parser.push(": comment\n");
        assert_eq!(parser.finish(), Vec::<String>::new());

        let mut parser = SseParser::default();
        parser.push("data: tail");
        assert_eq!(parser.finish(), vec!["tail"]);
    }

    #[tokio::test]
    async fn test_request_json_response() {
        let server = MockMcpServer::start().await;
        let transport =
            HttpTransport::new(HttpTransportConfig::new(server.url()).streaming(false)).unwrap();

        let response = transport
            .request(JsonRpcRequest::new(7, "tools/list", None))
            .await
            .unwrap();

        assert_eq!(response.id, Some(7));
        assert!(response.result.is_some());
    }

    #[tokio::test]
    async fn test_bearer_header_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jsonrpc_result(1, json!({}))))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(
            HttpTransportConfig::new(server.uri()).with_token("secret", TokenPlacement::Header),
        )
        .unwrap();

        transport
            .request(JsonRpcRequest::new(1, "initialize", None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_query_token_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param(ACCESS_TOKEN_PARAM, "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jsonrpc_result(1, json!({}))))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(
            HttpTransportConfig::new(server.uri()).with_token("secret", TokenPlacement::Query),
        )
        .unwrap();

        transport
            .request(JsonRpcRequest::new(1, "initialize", None))
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        assert!(received[0]
            .headers
            .iter()
            .all(|(name, _)| name.as_str() != "authorization"));
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(HttpTransportConfig::new(server.uri())).unwrap();
        let err = transport
            .request(JsonRpcRequest::new(1, "initialize", None))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransportError::HttpStatus {
                status: 401,
                body: "unauthorized".into()
            }
        );
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(HttpTransportConfig::new(server.uri())).unwrap();
        let err = transport
            .request(JsonRpcRequest::new(1, "initialize", None))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_event_stream_response_and_session() {
        let server = MockServer::start().await;
        let body = format!(
            "event: message\ndata: {}\n\ndata: {}\n\n",
            json!({"jsonrpc": "2.0", "method": "notifications/progress"}),
            jsonrpc_result(3, json!({"ok": true}))
        );
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("mcp-session-id", "sess-1")
                    .set_body_raw(body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(HttpTransportConfig::new(server.uri())).unwrap();
        let response = transport
            .request(JsonRpcRequest::new(3, "tools/call", None))
            .await
            .unwrap();

        assert_eq!(response.result, Some(json!({"ok": true})));
        assert_eq!(transport.session_id().await.as_deref(), Some("sess-1"));
    }

    #[tokio::test]
    async fn test_session_id_echoed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("mcp-session-id", "sess-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jsonrpc_result(2, json!({}))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("mcp-session-id", "sess-1")
                    .set_body_json(jsonrpc_result(1, json!({}))),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(HttpTransportConfig::new(server.uri())).unwrap();
        transport
            .request(JsonRpcRequest::new(1, "initialize", None))
            .await
            .unwrap();
        transport
            .request(JsonRpcRequest::new(2, "tools/list", None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_timeout_is_unreachable() {
        let server = MockMcpServer::builder()
            .delay(Duration::from_millis(500))
            .start()
            .await;
        let transport = HttpTransport::new(
            HttpTransportConfig::new(server.url()).timeout(Duration::from_millis(50)),
        )
        .unwrap();

        let err = transport
            .request(JsonRpcRequest::new(1, "initialize", None))
            .await
            .unwrap_err();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let transport =
            HttpTransport::new(HttpTransportConfig::new("http://127.0.0.1:1/mcp")).unwrap();
        let err = transport
            .request(JsonRpcRequest::new(1, "initialize", None))
            .await
            .unwrap_err();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_closed_transport_rejects_requests() {
        let server = MockMcpServer::start().await;
        let transport = HttpTransport::new(HttpTransportConfig::new(server.url())).unwrap();
        assert!(transport.is_connected());

        transport.close().await;
        transport.close().await;
        assert!(!transport.is_connected());

        let err = transport
            .request(JsonRpcRequest::new(1, "initialize", None))
            .await
            .unwrap_err();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_notification_accepts_202() {
        let server = MockMcpServer::start().await;
        let transport = HttpTransport::new(HttpTransportConfig::new(server.url())).unwrap();

        transport
            .notify(JsonRpcNotification::new("notifications/initialized", None))
            .await
            .unwrap();
    }
}
