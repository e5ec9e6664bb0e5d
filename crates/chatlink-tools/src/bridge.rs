//! MCP tools exposed as model tools.

use crate::describe::describe_tool;
use crate::error::{ToolError, ToolResult};
use crate::mapping::{ArgumentMapper, SchemaFieldMapper};
use chatlink_mcp::notify::{self, Notifier};
use chatlink_mcp::{InputSchema, McpConnection, McpTool, ToolOutcome};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Tool definition handed to the language model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// An MCP tool bound to the connection that serves it.
#[derive(Clone)]
pub struct ModelTool {
    name: String,
    remote_name: String,
    description: String,
    schema: Option<InputSchema>,
    connection: Arc<McpConnection>,
    mapper: Arc<dyn ArgumentMapper>,
    notifier: Arc<dyn Notifier>,
}

impl ModelTool {
    /// Name exposed to the model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name on the MCP server.
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn schema(&self) -> Option<&InputSchema> {
        self.schema.as_ref()
    }

    /// Key of the owning server.
    pub fn server(&self) -> &str {
        self.connection.key()
    }

    /// Display label of the owning server.
    pub fn server_name(&self) -> &str {
        self.connection.server()
    }

    pub fn connection(&self) -> &Arc<McpConnection> {
        &self.connection
    }

    /// Expose the tool under a different name. Calls still use the remote
    /// name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// JSON schema of the arguments the model fills in.
    pub fn parameters_schema(&self) -> Value {
        let field = self.mapper.input_field(self.schema.as_ref());
        let field_description = self
            .schema
            .as_ref()
            .and_then(|s| s.property(&field))
            .and_then(|f| f.description.clone());
        let input_description = match field_description {
            Some(d) => format!("Value for `{field}`: {d}"),
            None => format!("Value for `{field}`"),
        };

        json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": input_description
                },
                "additional_args": {
                    "type": "string",
                    "description": "Other arguments as a JSON object (optional)"
                }
            },
            "required": ["input"]
        })
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters_schema(),
        }
    }

    /// Map the arguments and call the tool. Transport errors propagate.
    pub async fn invoke(
        &self,
        input: &str,
        additional_args: Option<&str>,
    ) -> ToolResult<ToolOutcome> {
        let conversion = self
            .mapper
            .prepare_arguments(self.schema.as_ref(), input, additional_args);
        debug!(tool = %self.name, arguments = ?conversion.values, "Invoking tool");

        Ok(self
            .connection
            .call_tool(&self.remote_name, &conversion.values)
            .await?)
    }

    /// Entry point for a model tool call.
    ///
    /// Reads `input` and `additional_args` from the call arguments. A
    /// reported tool error comes back as `Error: <content>`.
    pub async fn call(&self, arguments: &Value) -> ToolResult<String> {
        let (input, additional_args) = read_call_arguments(arguments)?;

        self.notifier.notify(&format!("Calling {}…", self.name));
        match self.invoke(&input, additional_args.as_deref()).await {
            Ok(outcome) if outcome.is_error => {
                self.notifier
                    .notify(&format!("{} failed: {}", self.name, outcome.content));
                Ok(format!("Error: {}", outcome.content))
            }
            Ok(outcome) => {
                self.notifier.notify(&format!("{} finished", self.name));
                Ok(outcome.content)
            }
            Err(e) => {
                warn!(tool = %self.name, server = %self.server(), error = %e, "Tool call failed");
                self.notifier.notify(&format!("{} failed: {e}", self.name));
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for ModelTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelTool")
            .field("name", &self.name)
            .field("remote_name", &self.remote_name)
            .field("server", &self.server())
            .finish()
    }
}

fn read_call_arguments(arguments: &Value) -> ToolResult<(String, Option<String>)> {
    let Some(object) = arguments.as_object() else {
        return Err(ToolError::invalid_arguments(format!(
            "expected an object, got {arguments}"
        )));
    };

    let input = match object.get("input") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => {
            return Err(ToolError::invalid_arguments("missing `input`"));
        }
        Some(other) => other.to_string(),
    };

    let additional_args = match object.get("additional_args") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(v @ Value::Object(_)) => Some(v.to_string()),
        _ => None,
    };

    Ok((input, additional_args))
}

/// Builds [`ModelTool`]s for discovered MCP tools.
pub struct ToolBridge {
    mapper: Arc<dyn ArgumentMapper>,
    notifier: Arc<dyn Notifier>,
}

impl ToolBridge {
    pub fn new(mapper: Arc<dyn ArgumentMapper>, notifier: Arc<dyn Notifier>) -> Self {
        Self { mapper, notifier }
    }

    pub fn build_model_tool(&self, connection: &Arc<McpConnection>, tool: &McpTool) -> ModelTool {
        ModelTool {
            name: tool.name.clone(),
            remote_name: tool.name.clone(),
            description: describe_tool(
                &tool.name,
                tool.description.as_deref(),
                tool.input_schema.as_ref(),
            ),
            schema: tool.input_schema.clone(),
            connection: connection.clone(),
            mapper: self.mapper.clone(),
            notifier: self.notifier.clone(),
        }
    }

    /// One model tool per tool the connection discovered.
    pub async fn build_all(&self, connection: &Arc<McpConnection>) -> Vec<ModelTool> {
        connection
            .tools()
            .await
            .iter()
            .map(|tool| self.build_model_tool(connection, tool))
            .collect()
    }
}

impl Default for ToolBridge {
    fn default() -> Self {
        Self::new(Arc::new(SchemaFieldMapper::default()), notify::noop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlink_mcp::{ConnectionError, ConnectionOptions};
    use chatlink_test_utils::{fixtures, MockMcpServer};
    use std::sync::Mutex;
    use std::time::Duration;

    async fn connected(server: &MockMcpServer) -> Arc<McpConnection> {
        let options = ConnectionOptions {
            timeout: Duration::from_secs(5),
            ..ConnectionOptions::default()
        };
        let conn = Arc::new(McpConnection::new("weather", options).with_key(server.url()));
        conn.connect(&server.url()).await.unwrap();
        conn
    }

    async fn weather_server() -> MockMcpServer {
        MockMcpServer::builder()
            .tool_json(fixtures::weather_tool())
            .tool_result(
                "getWeather",
                json!({"content": [{"type": "text", "text": "Sunny"}]}),
            )
            .start()
            .await
    }

    #[tokio::test]
    async fn test_build_all() {
        let server = weather_server().await;
        let conn = connected(&server).await;

        let tools = ToolBridge::default().build_all(&conn).await;
        assert_eq!(tools.len(), 1);

        let tool = &tools[0];
        assert_eq!(tool.name(), "getWeather");
        assert_eq!(tool.remote_name(), "getWeather");
        assert_eq!(tool.server(), server.url());
        assert_eq!(tool.server_name(), "weather");
        assert!(tool
            .description()
            .starts_with("Get the weather forecast for a city\n\nRequired parameters:"));
    }

    #[tokio::test]
    async fn test_parameters_schema() {
        let server = weather_server().await;
        let conn = connected(&server).await;
        let tool = ToolBridge::default().build_all(&conn).await.remove(0);

        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], json!(["input"]));
        assert_eq!(schema["properties"]["input"]["type"], "string");
        assert_eq!(
            schema["properties"]["input"]["description"],
            "Value for `city`: City name"
        );
        assert!(schema["properties"]["additional_args"].is_object());

        let spec = tool.spec();
        assert_eq!(spec.name, "getWeather");
        assert_eq!(spec.parameters, schema);
    }

    #[tokio::test]
    async fn test_invoke_maps_primary_field() {
        let server = weather_server().await;
        let conn = connected(&server).await;
        let tool = ToolBridge::default().build_all(&conn).await.remove(0);

        let outcome = tool.invoke("Tokyo", Some(r#"{"days": 3}"#)).await.unwrap();
        assert_eq!(outcome, ToolOutcome::ok("Sunny"));
        assert_eq!(
            server.tool_calls().await,
            vec![("getWeather".to_string(), json!({"city": "Tokyo", "days": 3}))]
        );
    }

    #[tokio::test]
    async fn test_call_reads_model_arguments() {
        let server = weather_server().await;
        let conn = connected(&server).await;
        let tool = ToolBridge::default().build_all(&conn).await.remove(0);

        let text = tool
            .call(&json!({"input": "Osaka", "additional_args": {"days": 1}}))
            .await
            .unwrap();
        assert_eq!(text, "Sunny");
        assert_eq!(
            server.tool_calls().await[0].1,
            json!({"city": "Osaka", "days": 1})
        );
    }

    #[tokio::test]
    async fn test_call_reported_error() {
        let server = MockMcpServer::builder()
            .tool_json(fixtures::weather_tool())
            .tool_result(
                "getWeather",
                json!({"content": [{"type": "text", "text": "unknown city"}], "isError": true}),
            )
            .start()
            .await;
        let conn = connected(&server).await;

        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = seen.clone();
        let bridge = ToolBridge::new(
            Arc::new(SchemaFieldMapper::default()),
            Arc::new(move |m: &str| sink.lock().unwrap().push(m.to_string())),
        );
        let tool = bridge.build_all(&conn).await.remove(0);

        let text = tool.call(&json!({"input": "Atlantis"})).await.unwrap();
        assert_eq!(text, "Error: unknown city");
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Calling getWeather…", "getWeather failed: unknown city"]
        );
    }

    #[tokio::test]
    async fn test_call_invalid_arguments() {
        let server = weather_server().await;
        let conn = connected(&server).await;
        let tool = ToolBridge::default().build_all(&conn).await.remove(0);

        assert!(matches!(
            tool.call(&json!("Tokyo")).await,
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            tool.call(&json!({"additional_args": "{}"})).await,
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(server.tool_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_call_after_disconnect_propagates() {
        let server = weather_server().await;
        let conn = connected(&server).await;
        let tool = ToolBridge::default().build_all(&conn).await.remove(0);
        conn.disconnect().await;

        let err = tool.call(&json!({"input": "Tokyo"})).await.unwrap_err();
        assert_eq!(err, ToolError::Connection(ConnectionError::NotConnected));
    }

    #[tokio::test]
    async fn test_renamed_tool_calls_remote_name() {
        let server = weather_server().await;
        let conn = connected(&server).await;
        let tool = ToolBridge::default()
            .build_all(&conn)
            .await
            .remove(0)
            .with_name("weather__getWeather");

        assert_eq!(tool.name(), "weather__getWeather");
        tool.invoke("Tokyo", None).await.unwrap();
        assert_eq!(server.tool_calls().await[0].0, "getWeather");
    }

    #[tokio::test]
    async fn test_schemaless_tool_names_fallback_field() {
        let server = MockMcpServer::builder()
            .tool_json(json!({"name": "lookup", "description": "Look something up"}))
            .start()
            .await;
        let conn = connected(&server).await;
        let bridge = ToolBridge::new(Arc::new(SchemaFieldMapper::new("query")), notify::noop());
        let tool = bridge.build_all(&conn).await.remove(0);

        assert_eq!(
            tool.parameters_schema()["properties"]["input"]["description"],
            "Value for `query`"
        );

        tool.invoke("rust", None).await.unwrap();
        assert_eq!(
            server.tool_calls().await,
            vec![("lookup".to_string(), json!({"query": "rust"}))]
        );
    }

    #[test]
    fn test_read_call_arguments() {
        let (input, extra) = read_call_arguments(&json!({"input": 42})).unwrap();
        assert_eq!(input, "42");
        assert!(extra.is_none());

        let (_, extra) =
            read_call_arguments(&json!({"input": "x", "additional_args": "{\"a\":1}"})).unwrap();
        assert_eq!(extra.as_deref(), Some("{\"a\":1}"));
    }
}
