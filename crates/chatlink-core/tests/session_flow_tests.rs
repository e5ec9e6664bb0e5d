//! End-to-end flow: configuration file to connected servers to a chat turn
//! that calls a remote tool.

use async_trait::async_trait;
use chatlink_auth::MemoryTokenStore;
use chatlink_core::{
    ChatSession, Config, ConnectionOrchestrator, LanguageModel, ModelTurn, ProgressBus,
    SessionError, TranscriptEntry,
};
use chatlink_mcp::{AuthError, AuthorizationAgent, OAuthAuthenticator};
use chatlink_test_utils::{fixtures, MockMcpServer, TestConfigDir};
use chatlink_tools::{SchemaFieldMapper, ToolBridge, ToolSpec};
use serde_json::json;
use std::sync::Arc;
use url::Url;

/// Agent for configurations that never need a browser.
struct NoBrowser;

#[async_trait]
impl AuthorizationAgent for NoBrowser {
    fn redirect_uri(&self) -> String {
        "http://127.0.0.1:19876/oauth/callback".to_string()
    }

    async fn authorize(&self, _authorization_url: &Url) -> Result<Url, AuthError> {
        Err(AuthError::UserCancelled)
    }
}

/// Calls the first offered tool once, then answers with its result.
struct FirstToolModel;

#[async_trait]
impl LanguageModel for FirstToolModel {
    async fn next_turn(
        &self,
        _instructions: &str,
        tools: &[ToolSpec],
        transcript: &[TranscriptEntry],
    ) -> Result<ModelTurn, SessionError> {
        if let Some(TranscriptEntry::ToolResult { content, .. }) = transcript.last() {
            return Ok(ModelTurn::Final(format!("The tool said: {content}")));
        }
        let tool = tools
            .first()
            .ok_or_else(|| SessionError::model("no tools offered"))?;
        Ok(ModelTurn::ToolCall {
            name: tool.name.clone(),
            arguments: json!({"input": "Tokyo"}),
        })
    }
}

async fn orchestrator_for(config: Config, bus: &ProgressBus) -> ConnectionOrchestrator {
    let store = Arc::new(MemoryTokenStore::new());
    let notifier = Arc::new(bus.clone());
    let authenticator = Arc::new(
        OAuthAuthenticator::new(store.clone(), Arc::new(NoBrowser))
            .with_notifier(notifier.clone()),
    );
    let bridge = Arc::new(ToolBridge::new(
        Arc::new(SchemaFieldMapper::new(
            config.bridge_settings().fallback_argument_key(),
        )),
        notifier.clone(),
    ));
    ConnectionOrchestrator::new(Arc::new(config), authenticator, store, bridge, notifier)
}

#[tokio::test]
async fn test_config_to_chat_turn() {
    let server = MockMcpServer::builder()
        .tool_json(fixtures::weather_tool())
        .tool_result(
            "getWeather",
            json!({"content": [{"type": "text", "text": "Rain"}]}),
        )
        .start()
        .await;
    let dir = TestConfigDir::new().with_config(&json!({
        "servers": [
            {"name": "Weather", "url": server.url()},
            {"name": "Off", "url": "http://127.0.0.1:1/mcp", "enabled": false}
        ]
    }));

    let (config, sources) = Config::load_from(None, None, Some(dir.path()))
        .await
        .unwrap();
    assert_eq!(sources, vec![dir.join("chatlink.json")]);

    let bus = ProgressBus::new();
    let mut progress = bus.subscribe();
    let orchestrator = Arc::new(orchestrator_for(config, &bus).await);

    let summary = orchestrator.connect_to_all_servers().await;
    assert_eq!(summary.status_line(), "All 1 servers connected (1 tools)");

    let mut session = ChatSession::new(
        Arc::new(FirstToolModel),
        "Answer weather questions.",
        orchestrator.merged_tools().await,
    )
    .with_failure_reporter(orchestrator.clone());

    let reply = session.respond("Weather in Tokyo?").await;
    assert_eq!(reply, "The tool said: Rain");
    assert_eq!(
        server.tool_calls().await,
        vec![("getWeather".to_string(), json!({"city": "Tokyo"}))]
    );

    let mut messages = Vec::new();
    while let Ok(message) = progress.try_recv() {
        messages.push(message);
    }
    assert!(messages.iter().any(|m| m.starts_with("Connecting to Weather")));
    assert!(messages.iter().any(|m| m == "getWeather finished"));
}

#[tokio::test]
async fn test_tool_failure_marks_server_failed() {
    let server = MockMcpServer::builder()
        .tool_json(fixtures::weather_tool())
        .start()
        .await;
    let dir = TestConfigDir::new().with_config(&json!({
        "servers": [{"name": "Weather", "url": server.url()}]
    }));
    let (config, _) = Config::load_from(None, None, Some(dir.path()))
        .await
        .unwrap();

    let orchestrator = Arc::new(orchestrator_for(config, &ProgressBus::new()).await);
    orchestrator.connect_to_all_servers().await;
    let tools = orchestrator.merged_tools().await;

    // Drop the transport underneath the session.
    tools[0].connection().disconnect().await;

    let mut session = ChatSession::new(Arc::new(FirstToolModel), "", tools)
        .with_failure_reporter(orchestrator.clone());
    let reply = session.respond("Weather?").await;

    assert!(reply.starts_with("⚠️ "));
    assert_eq!(orchestrator.summary().failed, 1);
    assert!(orchestrator.merged_tools().await.is_empty());
}
