//! Chat session boundary.
//!
//! The language model itself is opaque: it sees the instructions, the
//! available tool specs and the transcript so far, and answers with either
//! final text or a request to call one tool. [`ChatSession`] runs that loop,
//! dispatching tool calls through the bridged [`ModelTool`]s.

use crate::error::SessionError;
use async_trait::async_trait;
use chatlink_tools::{ModelTool, ToolError, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default bound on tool calls per user message.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// Prefix of assistant messages that report a failure.
pub const FAILURE_PREFIX: &str = "⚠️ ";

/// What the model wants to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    Final(String),
    ToolCall { name: String, arguments: Value },
}

/// One entry of the conversation as the model sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum TranscriptEntry {
    User { content: String },
    Assistant { content: String },
    ToolCall { name: String, arguments: Value },
    ToolResult { name: String, content: String },
}

/// A tool-calling language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn next_turn(
        &self,
        instructions: &str,
        tools: &[ToolSpec],
        transcript: &[TranscriptEntry],
    ) -> Result<ModelTurn, SessionError>;
}

/// Told when a tool call could not reach its server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FailureReporter: Send + Sync {
    async fn report_failure(&self, tool: &ModelTool, reason: &str);
}

/// One conversation with a model and a fixed tool set.
pub struct ChatSession {
    model: Arc<dyn LanguageModel>,
    instructions: String,
    tools: Vec<Arc<ModelTool>>,
    specs: Vec<ToolSpec>,
    transcript: Vec<TranscriptEntry>,
    reporter: Option<Arc<dyn FailureReporter>>,
    max_tool_rounds: usize,
}

impl ChatSession {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        instructions: impl Into<String>,
        tools: Vec<Arc<ModelTool>>,
    ) -> Self {
        let specs = tools.iter().map(|t| t.spec()).collect();
        Self {
            model,
            instructions: instructions.into(),
            tools,
            specs,
            transcript: Vec::new(),
            reporter: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_failure_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Answer a user message. Failures come back as a `⚠️ ` message.
    pub async fn respond(&mut self, user_message: &str) -> String {
        self.transcript.push(TranscriptEntry::User {
            content: user_message.to_string(),
        });

        let reply = match self.run().await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Chat turn failed");
                format!("{FAILURE_PREFIX}{e}")
            }
        };

        self.transcript.push(TranscriptEntry::Assistant {
            content: reply.clone(),
        });
        reply
    }

    async fn run(&mut self) -> Result<String, SessionError> {
        for _ in 0..self.max_tool_rounds {
            let turn = self
                .model
                .next_turn(&self.instructions, &self.specs, &self.transcript)
                .await?;

            let (name, arguments) = match turn {
                ModelTurn::Final(text) => return Ok(text),
                ModelTurn::ToolCall { name, arguments } => (name, arguments),
            };

            debug!(tool = %name, "Model requested tool");
            self.transcript.push(TranscriptEntry::ToolCall {
                name: name.clone(),
                arguments: arguments.clone(),
            });

            let content = self.dispatch(&name, &arguments).await?;
            self.transcript
                .push(TranscriptEntry::ToolResult { name, content });
        }

        Err(SessionError::ToolRoundsExceeded(self.max_tool_rounds))
    }

    /// Run one tool call. Unknown tools and bad arguments are fed back to
    /// the model; transport failures end the turn.
    async fn dispatch(&self, name: &str, arguments: &Value) -> Result<String, SessionError> {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            return Ok(format!("Error: unknown tool {name}"));
        };

        match tool.call(arguments).await {
            Ok(content) => Ok(content),
            Err(ToolError::InvalidArguments(message)) => Ok(format!("Error: {message}")),
            Err(e) => {
                if let Some(reporter) = &self.reporter {
                    reporter.report_failure(tool, &e.to_string()).await;
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlink_mcp::{ConnectionOptions, McpConnection};
    use chatlink_test_utils::{fixtures, MockMcpServer};
    use chatlink_tools::ToolBridge;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Model that plays back a fixed list of turns and records what it saw.
    struct ScriptedModel {
        turns: Mutex<VecDeque<Result<ModelTurn, SessionError>>>,
        seen: Mutex<Vec<Vec<TranscriptEntry>>>,
    }

    impl ScriptedModel {
        fn new(turns: Vec<Result<ModelTurn, SessionError>>) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(turns.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn last_seen(&self) -> Vec<TranscriptEntry> {
            self.seen.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn next_turn(
            &self,
            _instructions: &str,
            _tools: &[ToolSpec],
            transcript: &[TranscriptEntry],
        ) -> Result<ModelTurn, SessionError> {
            self.seen.lock().unwrap().push(transcript.to_vec());
            self.turns
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ModelTurn::Final("done".into())))
        }
    }

    fn call(name: &str, arguments: Value) -> Result<ModelTurn, SessionError> {
        Ok(ModelTurn::ToolCall {
            name: name.to_string(),
            arguments,
        })
    }

    async fn weather_tools(server: &MockMcpServer) -> (Arc<McpConnection>, Vec<Arc<ModelTool>>) {
        let options = ConnectionOptions {
            timeout: Duration::from_secs(5),
            ..ConnectionOptions::default()
        };
        let connection = Arc::new(McpConnection::new("weather", options).with_key(server.url()));
        connection.connect(&server.url()).await.unwrap();
        let tools = ToolBridge::default()
            .build_all(&connection)
            .await
            .into_iter()
            .map(Arc::new)
            .collect();
        (connection, tools)
    }

    async fn weather_server() -> MockMcpServer {
        MockMcpServer::builder()
            .tool_json(fixtures::weather_tool())
            .tool_result(
                "getWeather",
                json!({"content": [{"type": "text", "text": "Sunny, 22°C"}]}),
            )
            .start()
            .await
    }

    #[tokio::test]
    async fn test_final_answer_without_tools() {
        let model = ScriptedModel::new(vec![Ok(ModelTurn::Final("Hello!".into()))]);
        let mut session = ChatSession::new(model.clone(), "Be brief.", vec![]);

        assert_eq!(session.respond("hi").await, "Hello!");
        assert_eq!(
            session.transcript(),
            &[
                TranscriptEntry::User {
                    content: "hi".into()
                },
                TranscriptEntry::Assistant {
                    content: "Hello!".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let server = weather_server().await;
        let (_conn, tools) = weather_tools(&server).await;
        let model = ScriptedModel::new(vec![
            call("getWeather", json!({"input": "Tokyo"})),
            Ok(ModelTurn::Final("It is sunny in Tokyo.".into())),
        ]);
        let mut session = ChatSession::new(model.clone(), "", tools);
        assert_eq!(session.tools()[0].name, "getWeather");

        let reply = session.respond("Weather in Tokyo?").await;

        assert_eq!(reply, "It is sunny in Tokyo.");
        let seen = model.last_seen();
        assert_eq!(
            seen.last(),
            Some(&TranscriptEntry::ToolResult {
                name: "getWeather".into(),
                content: "Sunny, 22°C".into()
            })
        );
        assert_eq!(
            server.tool_calls().await,
            vec![("getWeather".to_string(), json!({"city": "Tokyo"}))]
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments_fed_back() {
        let server = weather_server().await;
        let (_conn, tools) = weather_tools(&server).await;
        let model = ScriptedModel::new(vec![
            call("nope", json!({"input": "x"})),
            call("getWeather", json!({})),
            Ok(ModelTurn::Final("Sorry.".into())),
        ]);
        let mut session = ChatSession::new(model.clone(), "", tools);

        assert_eq!(session.respond("?").await, "Sorry.");

        let results: Vec<String> = model
            .last_seen()
            .into_iter()
            .filter_map(|e| match e {
                TranscriptEntry::ToolResult { content, .. } => Some(content),
                _ => None,
            })
            .collect();
        assert_eq!(results[0], "Error: unknown tool nope");
        assert!(results[1].starts_with("Error: "));
        assert!(server.tool_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_model_error_rendered() {
        let model = ScriptedModel::new(vec![Err(SessionError::model("rate limited"))]);
        let mut session = ChatSession::new(model, "", vec![]);

        let reply = session.respond("hi").await;

        assert_eq!(reply, "⚠️ model error: rate limited");
    }

    #[tokio::test]
    async fn test_tool_rounds_bounded() {
        let server = weather_server().await;
        let (_conn, tools) = weather_tools(&server).await;
        let model = ScriptedModel::new(
            (0..5)
                .map(|_| call("getWeather", json!({"input": "Tokyo"})))
                .collect(),
        );
        let mut session = ChatSession::new(model, "", tools).max_tool_rounds(2);

        let reply = session.respond("loop").await;

        assert!(reply.starts_with(FAILURE_PREFIX));
        assert!(reply.contains("2 tool calls"));
        assert_eq!(server.tool_calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_reported() {
        let server = weather_server().await;
        let (conn, tools) = weather_tools(&server).await;
        conn.disconnect().await;

        let url = server.url();
        let mut reporter = MockFailureReporter::new();
        reporter
            .expect_report_failure()
            .withf(move |tool: &ModelTool, _reason: &str| tool.server() == url)
            .times(1)
            .return_const(());

        let model = ScriptedModel::new(vec![call("getWeather", json!({"input": "Tokyo"}))]);
        let mut session =
            ChatSession::new(model, "", tools).with_failure_reporter(Arc::new(reporter));

        let reply = session.respond("Weather?").await;

        assert!(reply.starts_with(FAILURE_PREFIX));
    }
}
