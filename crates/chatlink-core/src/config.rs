//! Configuration management for chatlink.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.config/chatlink/chatlink.json`
//! 2. Environment variable: `CHATLINK_CONFIG_CONTENT`
//! 3. Project config: `chatlink.json` in the project directory
//!
//! Supports variable substitution:
//! - `{env:VAR_NAME}` - Substitute environment variable
//! - `{file:path}` - Substitute file contents

use crate::error::{ConfigError, ConfigResult};
use chatlink_mcp::callback::{DEFAULT_CALLBACK_PORT, DEFAULT_CALLBACK_TIMEOUT};
use chatlink_mcp::http::DEFAULT_TIMEOUT;
use chatlink_mcp::{ConnectionOptions, OAuthClientConfig, TokenPlacement};
use chatlink_tools::DEFAULT_FALLBACK_KEY;
use chatlink_util::LogLevel;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

pub const CONFIG_FILE: &str = "chatlink.json";
pub const CONFIG_CONTENT_ENV: &str = "CHATLINK_CONFIG_CONTENT";

const VAR_PATTERN: &str = r"\{(env|file):([^}]+)\}";

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

/// One configured MCP server.
///
/// Only `enabled` and the client secret change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfiguration {
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    #[serde(default)]
    name: String,
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
    #[serde(default)]
    token_placement: TokenPlacement,
    #[serde(default = "default_true")]
    streaming: bool,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

impl ServerConfiguration {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            client_id: None,
            client_secret: None,
            enabled: true,
            created_at: now,
            updated_at: now,
            token_placement: TokenPlacement::default(),
            streaming: true,
            timeout_ms: default_timeout_ms(),
        }
    }

    /// Register a pre-provisioned OAuth client.
    pub fn with_oauth(mut self, client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = client_secret;
        self
    }

    pub fn with_token_placement(mut self, placement: TokenPlacement) -> Self {
        self.token_placement = placement;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoint URL; also the server key.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn token_placement(&self) -> TokenPlacement {
        self.token_placement
    }

    pub fn streaming(&self) -> bool {
        self.streaming
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.updated_at = Utc::now();
    }

    pub fn rotate_secret(&mut self, client_secret: Option<String>) {
        self.client_secret = client_secret;
        self.updated_at = Utc::now();
    }

    /// `name`, else the URL host, else the URL.
    pub fn display_name(&self) -> String {
        if !self.name.trim().is_empty() {
            return self.name.clone();
        }
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone())
    }

    /// OAuth client, when one is configured.
    pub fn oauth_client(&self) -> Option<OAuthClientConfig> {
        self.client_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| OAuthClientConfig::new(id, self.client_secret.clone()))
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            placement: self.token_placement,
            streaming: self.streaming,
            timeout: self.timeout(),
        }
    }

    /// Whether `key` names this server by URL, name or id.
    pub fn matches(&self, key: &str) -> bool {
        self.url == key || (!self.name.is_empty() && self.name == key) || self.id.to_string() == key
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let url = Url::parse(&self.url).map_err(|e| {
            ConfigError::validation(format!("server {}: invalid url {}: {e}", self.display_name(), self.url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::validation(format!(
                "server {}: unsupported scheme {}",
                self.display_name(),
                url.scheme()
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::validation(format!(
                "server {}: timeout_ms must be positive",
                self.display_name()
            )));
        }
        Ok(())
    }
}

/// Read access to the configured servers.
pub trait ConfigurationProvider: Send + Sync {
    fn servers(&self) -> Vec<ServerConfiguration>;

    fn enabled_servers(&self) -> Vec<ServerConfiguration> {
        self.servers().into_iter().filter(|s| s.enabled()).collect()
    }

    fn server(&self, key: &str) -> Option<ServerConfiguration> {
        self.servers().into_iter().find(|s| s.matches(key))
    }
}

impl ConfigurationProvider for Vec<ServerConfiguration> {
    fn servers(&self) -> Vec<ServerConfiguration> {
        self.clone()
    }
}

/// OAuth settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    /// Redirect URI to advertise instead of the loopback default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_port: Option<u16>,

    /// How long to wait for the browser redirect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_pkce: Option<bool>,
}

impl OAuthSettings {
    pub fn callback_port(&self) -> u16 {
        self.callback_port.unwrap_or(DEFAULT_CALLBACK_PORT)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CALLBACK_TIMEOUT)
    }

    pub fn use_pkce(&self) -> bool {
        self.use_pkce.unwrap_or(false)
    }

    fn merge(mut self, other: Self) -> Self {
        if other.redirect_uri.is_some() {
            self.redirect_uri = other.redirect_uri;
        }
        if other.callback_port.is_some() {
            self.callback_port = other.callback_port;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.use_pkce.is_some() {
            self.use_pkce = other.use_pkce;
        }
        self
    }
}

/// Tool bridge settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Argument key used when a tool declares no schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_argument_key: Option<String>,
}

impl BridgeSettings {
    pub fn fallback_argument_key(&self) -> &str {
        self.fallback_argument_key
            .as_deref()
            .unwrap_or(DEFAULT_FALLBACK_KEY)
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON Schema reference.
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerConfiguration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OAuthSettings>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<BridgeSettings>,

    /// `debug`, `info`, `warn` or `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Loading order (later sources override earlier):
    /// 1. Global config from `~/.config/chatlink/`
    /// 2. `CHATLINK_CONFIG_CONTENT` environment variable
    /// 3. Project config from `project_dir`
    pub async fn load(project_dir: Option<&Path>) -> ConfigResult<(Self, Vec<PathBuf>)> {
        let global_dir = Self::global_config_dir();
        let env_content = std::env::var(CONFIG_CONTENT_ENV).ok();
        Self::load_from(global_dir.as_deref(), env_content.as_deref(), project_dir).await
    }

    /// Load from explicit sources.
    pub async fn load_from(
        global_dir: Option<&Path>,
        env_content: Option<&str>,
        project_dir: Option<&Path>,
    ) -> ConfigResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        if let Some(dir) = global_dir {
            let path = dir.join(CONFIG_FILE);
            if path.exists() {
                config = config.merge(Self::load_file(&path).await?);
                sources.push(path);
            }
        }

        if let Some(content) = env_content {
            let content = substitute_variables(content, Path::new("."))?;
            config = config.merge(Self::parse(&content, "<env>")?);
        }

        if let Some(dir) = project_dir {
            let path = dir.join(CONFIG_FILE);
            if path.exists() {
                config = config.merge(Self::load_file(&path).await?);
                sources.push(path);
            }
        }

        config.validate()?;
        Ok((config, sources))
    }

    /// Global config directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        chatlink_util::paths::config_dir()
    }

    /// Default file written by `save`.
    pub fn default_path() -> ConfigResult<PathBuf> {
        Self::global_config_dir()
            .map(|d| d.join(CONFIG_FILE))
            .ok_or_else(|| ConfigError::InvalidPath("Could not determine config directory".into()))
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = substitute_variables(&content, path)?;
        Self::parse(&content, &path.display().to_string())
    }

    fn parse(content: &str, source: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::InvalidJson {
            path: source.to_string(),
            message: e.to_string(),
        })
    }

    /// Write the configuration as pretty JSON.
    pub async fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::InvalidJson {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tokio::fs::write(path, content).await?;
        tracing::info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Merge another config into this one (other takes precedence).
    ///
    /// Servers are matched by URL; unmatched ones are appended.
    pub fn merge(mut self, other: Self) -> Self {
        if other.schema.is_some() {
            self.schema = other.schema;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }

        self.oauth = match (self.oauth, other.oauth) {
            (Some(base), Some(other)) => Some(base.merge(other)),
            (base, None) => base,
            (None, other) => other,
        };
        if other.bridge.is_some() {
            self.bridge = other.bridge;
        }

        for server in other.servers {
            match self.servers.iter_mut().find(|s| s.url == server.url) {
                Some(existing) => *existing = server,
                None => self.servers.push(server),
            }
        }

        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for server in &self.servers {
            server.validate()?;
        }
        if let Some(level) = &self.log_level {
            if LogLevel::parse(level).is_none() {
                return Err(ConfigError::validation(format!("unknown log level: {level}")));
            }
        }
        Ok(())
    }

    pub fn oauth_settings(&self) -> OAuthSettings {
        self.oauth.clone().unwrap_or_default()
    }

    pub fn bridge_settings(&self) -> BridgeSettings {
        self.bridge.clone().unwrap_or_default()
    }

    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Find a server by URL, name or id.
    pub fn find_server(&self, key: &str) -> Option<&ServerConfiguration> {
        self.servers.iter().find(|s| s.matches(key))
    }

    /// Add a server. URLs must be unique.
    pub fn add_server(&mut self, server: ServerConfiguration) -> ConfigResult<()> {
        server.validate()?;
        if self.servers.iter().any(|s| s.url == server.url) {
            return Err(ConfigError::validation(format!(
                "server already configured: {}",
                server.url
            )));
        }
        self.servers.push(server);
        Ok(())
    }

    pub fn remove_server(&mut self, key: &str) -> Option<ServerConfiguration> {
        let index = self.servers.iter().position(|s| s.matches(key))?;
        Some(self.servers.remove(index))
    }

    /// Returns false when no server matches.
    pub fn set_server_enabled(&mut self, key: &str, enabled: bool) -> bool {
        match self.servers.iter_mut().find(|s| s.matches(key)) {
            Some(server) => {
                server.set_enabled(enabled);
                true
            }
            None => false,
        }
    }
}

impl ConfigurationProvider for Config {
    fn servers(&self) -> Vec<ServerConfiguration> {
        self.servers.clone()
    }
}

/// Substitute `{env:NAME}` and `{file:path}` references.
///
/// File paths are relative to the directory of `config_path`.
fn substitute_variables(content: &str, config_path: &Path) -> ConfigResult<String> {
    let re = Regex::new(VAR_PATTERN).map_err(|e| ConfigError::validation(e.to_string()))?;
    let config_dir = config_path.parent().unwrap_or(Path::new("."));

    let mut result = String::with_capacity(content.len());
    let mut last = 0;
    for cap in re.captures_iter(content) {
        let (Some(whole), Some(kind), Some(value)) = (cap.get(0), cap.get(1), cap.get(2)) else {
            continue;
        };

        let replacement = match kind.as_str() {
            "env" => std::env::var(value.as_str()).map_err(|_| ConfigError::EnvVarNotFound {
                name: value.as_str().to_string(),
            })?,
            _ => {
                let file_path = config_dir.join(value.as_str());
                std::fs::read_to_string(&file_path)
                    .map(|v| v.trim().to_string())
                    .map_err(|_| ConfigError::FileRefNotFound {
                        path: file_path.display().to_string(),
                    })?
            }
        };

        result.push_str(&content[last..whole.start()]);
        result.push_str(&replacement);
        last = whole.end();
    }
    result.push_str(&content[last..]);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlink_test_utils::TestConfigDir;
    use serde_json::json;

    fn server_json(url: &str) -> serde_json::Value {
        json!({"name": "Weather", "url": url, "client_id": "cid", "client_secret": "sec"})
    }

    #[test]
    fn test_server_defaults_from_json() {
        let server: ServerConfiguration =
            serde_json::from_value(json!({"url": "https://w.example.com/mcp"})).unwrap();

        assert!(server.enabled());
        assert!(server.streaming());
        assert_eq!(server.token_placement(), TokenPlacement::Header);
        assert_eq!(server.timeout(), Duration::from_secs(30));
        assert!(server.oauth_client().is_none());
        assert_eq!(server.display_name(), "w.example.com");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(
            ServerConfiguration::new("Weather", "https://w.example.com").display_name(),
            "Weather"
        );
        assert_eq!(
            ServerConfiguration::new("", "https://w.example.com/mcp").display_name(),
            "w.example.com"
        );
        assert_eq!(
            ServerConfiguration::new("", "not a url").display_name(),
            "not a url"
        );
    }

    #[test]
    fn test_mutators_bump_updated_at() {
        let mut server = ServerConfiguration::new("w", "https://w.example.com")
            .with_oauth("cid", Some("old".into()));
        let before = server.updated_at();

        std::thread::sleep(std::time::Duration::from_millis(5));
        server.set_enabled(false);
        assert!(!server.enabled());
        assert!(server.updated_at() > before);

        let mid = server.updated_at();
        std::thread::sleep(std::time::Duration::from_millis(5));
        server.rotate_secret(Some("new".into()));
        assert_eq!(server.client_secret(), Some("new"));
        assert!(server.updated_at() > mid);
        assert_eq!(server.created_at(), before);
    }

    #[test]
    fn test_oauth_client_and_options() {
        let server = ServerConfiguration::new("w", "https://w.example.com")
            .with_oauth("cid", Some("sec".into()))
            .with_token_placement(TokenPlacement::Query)
            .with_streaming(false)
            .with_timeout_ms(1500);

        let client = server.oauth_client().unwrap();
        assert_eq!(client.client_id, "cid");
        assert_eq!(client.client_secret.as_deref(), Some("sec"));

        let options = server.connection_options();
        assert_eq!(options.placement, TokenPlacement::Query);
        assert!(!options.streaming);
        assert_eq!(options.timeout, Duration::from_millis(1500));

        let empty = ServerConfiguration::new("w", "https://w.example.com").with_oauth("", None);
        assert!(empty.oauth_client().is_none());
    }

    #[test]
    fn test_validate() {
        assert!(ServerConfiguration::new("a", "https://a.example.com").validate().is_ok());
        assert!(ServerConfiguration::new("a", "ftp://a.example.com").validate().is_err());
        assert!(ServerConfiguration::new("a", "nope").validate().is_err());
        assert!(ServerConfiguration::new("a", "https://a.example.com")
            .with_timeout_ms(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_server_management() {
        let mut config = Config::default();
        config
            .add_server(ServerConfiguration::new("a", "https://a.example.com/mcp"))
            .unwrap();
        assert!(config
            .add_server(ServerConfiguration::new("dup", "https://a.example.com/mcp"))
            .is_err());

        assert!(config.set_server_enabled("a", false));
        assert!(!config.find_server("https://a.example.com/mcp").unwrap().enabled());
        assert!(config.enabled_servers().is_empty());
        assert!(!config.set_server_enabled("missing", true));

        let id = config.servers[0].id().to_string();
        assert!(config.find_server(&id).is_some());
        assert!(config.remove_server("a").is_some());
        assert!(config.servers.is_empty());
    }

    #[test]
    fn test_merge() {
        let base = Config {
            servers: vec![
                ServerConfiguration::new("a", "https://a.example.com"),
                ServerConfiguration::new("b", "https://b.example.com"),
            ],
            oauth: Some(OAuthSettings {
                callback_port: Some(5000),
                ..Default::default()
            }),
            log_level: Some("info".into()),
            ..Default::default()
        };
        let other = Config {
            servers: vec![
                ServerConfiguration::new("b2", "https://b.example.com"),
                ServerConfiguration::new("c", "https://c.example.com"),
            ],
            oauth: Some(OAuthSettings {
                use_pkce: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = base.merge(other);
        let names: Vec<&str> = merged.servers.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["a", "b2", "c"]);
        let oauth = merged.oauth_settings();
        assert_eq!(oauth.callback_port(), 5000);
        assert!(oauth.use_pkce());
        assert_eq!(merged.log_level(), Some(LogLevel::Info));
    }

    #[test]
    fn test_settings_defaults() {
        let config = Config::default();
        assert_eq!(config.oauth_settings().callback_port(), DEFAULT_CALLBACK_PORT);
        assert_eq!(config.oauth_settings().timeout(), Duration::from_secs(300));
        assert!(!config.oauth_settings().use_pkce());
        assert_eq!(config.bridge_settings().fallback_argument_key(), "city");
    }

    #[test]
    fn test_substitute_env() {
        std::env::set_var("CHATLINK_TEST_SECRET", "s3cret");
        let out = substitute_variables(
            r#"{"client_secret": "{env:CHATLINK_TEST_SECRET}"}"#,
            Path::new("chatlink.json"),
        )
        .unwrap();
        assert_eq!(out, r#"{"client_secret": "s3cret"}"#);

        let err = substitute_variables("{env:CHATLINK_TEST_MISSING_VAR}", Path::new("x")).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotFound { .. }));
    }

    #[test]
    fn test_substitute_file() {
        let dir = TestConfigDir::new().with_file("secret.txt", "from-file\n");
        let out = substitute_variables("x={file:secret.txt}", &dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(out, "x=from-file");

        let err = substitute_variables("{file:missing.txt}", &dir.join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, ConfigError::FileRefNotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_from_sources() {
        let global = TestConfigDir::new().with_config(&json!({
            "servers": [server_json("https://a.example.com/mcp")],
            "log_level": "warn"
        }));
        let project = TestConfigDir::new().with_config(&json!({
            "servers": [{"name": "B", "url": "https://b.example.com/mcp"}],
            "bridge": {"fallback_argument_key": "query"}
        }));
        let env = r#"{"oauth": {"use_pkce": true}, "log_level": "debug"}"#;

        let (config, sources) =
            Config::load_from(Some(global.path()), Some(env), Some(project.path()))
                .await
                .unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.log_level(), Some(LogLevel::Debug));
        assert!(config.oauth_settings().use_pkce());
        assert_eq!(config.bridge_settings().fallback_argument_key(), "query");
        assert_eq!(config.servers[0].client_id(), Some("cid"));
    }

    #[tokio::test]
    async fn test_load_rejects_invalid() {
        let project = TestConfigDir::new().with_file(CONFIG_FILE, "{ not json");
        let err = Config::load_from(None, None, Some(project.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJson { .. }));

        let project = TestConfigDir::new().with_config(&json!({
            "servers": [{"url": "file:///etc/passwd"}]
        }));
        let err = Config::load_from(None, None, Some(project.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TestConfigDir::new();
        let path = dir.join("nested").join(CONFIG_FILE);

        let mut config = Config::default();
        config
            .add_server(
                ServerConfiguration::new("Weather", "https://w.example.com/mcp")
                    .with_oauth("cid", None)
                    .with_token_placement(TokenPlacement::Query),
            )
            .unwrap();
        config.save(&path).await.unwrap();

        let loaded = Config::load_file(&path).await.unwrap();
        assert_eq!(loaded, config);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["servers"][0]["token_placement"], "query");
        assert!(raw.get("oauth").is_none());
    }
}
