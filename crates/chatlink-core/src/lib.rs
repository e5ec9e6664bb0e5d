//! Core of chatlink.
//!
//! This crate ties the MCP client and the tool bridge together:
//! - Configuration loading and the server list
//! - A progress bus for user-facing status
//! - Connection orchestration across servers
//! - The chat session boundary around a tool-calling model

pub mod bus;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod session;

pub use bus::ProgressBus;
pub use config::{
    BridgeSettings, Config, ConfigurationProvider, OAuthSettings, ServerConfiguration,
};
pub use error::{ConfigError, ConfigResult, OrchestratorError, SessionError};
pub use orchestrator::{ConnectionOrchestrator, ConnectionStatus, ConnectionSummary};
pub use session::{
    ChatSession, FailureReporter, LanguageModel, ModelTurn, TranscriptEntry,
    DEFAULT_MAX_TOOL_ROUNDS,
};
