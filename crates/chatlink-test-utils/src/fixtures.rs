//! Test fixtures: tool definitions and temporary config directories.

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Input schema with a required `city` and an optional `days`.
pub fn weather_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "city": {"type": "string", "description": "City name"},
            "days": {"type": "integer", "description": "Number of forecast days"}
        },
        "required": ["city"]
    })
}

/// A `getWeather` tool as a server would list it.
pub fn weather_tool() -> Value {
    json!({
        "name": "getWeather",
        "description": "Get the weather forecast for a city",
        "inputSchema": weather_schema()
    })
}

/// Schema with one required `unit` property allowing `count` values
/// `v1`..`vN`.
pub fn enum_schema(count: usize) -> Value {
    let values: Vec<String> = (1..=count).map(|i| format!("v{i}")).collect();
    json!({
        "type": "object",
        "properties": {
            "unit": {"type": "string", "description": "Unit", "enum": values}
        },
        "required": ["unit"]
    })
}

/// A temporary directory holding config files.
///
/// Cleaned up when dropped.
///
/// ```rust
/// use chatlink_test_utils::TestConfigDir;
///
/// let dir = TestConfigDir::new().with_file("chatlink.json", "{}");
/// assert!(dir.path().join("chatlink.json").exists());
/// ```
pub struct TestConfigDir {
    temp_dir: TempDir,
}

impl TestConfigDir {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write a file relative to the directory root, creating parents.
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl AsRef<str>) -> Self {
        let full = self.temp_dir.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&full, contents.as_ref()).expect("Failed to write fixture file");
        self
    }

    /// Write `chatlink.json` with the given JSON.
    pub fn with_config(self, config: &Value) -> Self {
        let text = serde_json::to_string_pretty(config).expect("Failed to serialize config");
        self.with_file("chatlink.json", text)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.temp_dir.path().join(path)
    }
}

impl Default for TestConfigDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_tool_shape() {
        let tool = weather_tool();
        assert_eq!(tool["name"], "getWeather");
        assert_eq!(tool["inputSchema"]["required"][0], "city");
    }

    #[test]
    fn test_enum_schema() {
        let schema = enum_schema(3);
        assert_eq!(
            schema["properties"]["unit"]["enum"],
            json!(["v1", "v2", "v3"])
        );
    }

    #[test]
    fn test_config_dir_files() {
        let dir = TestConfigDir::new()
            .with_file("nested/a.txt", "hello")
            .with_config(&json!({"servers": []}));

        assert_eq!(fs::read_to_string(dir.join("nested/a.txt")).unwrap(), "hello");
        assert!(dir.path().join("chatlink.json").exists());
    }
}
