//! Tool bridge for chatlink.
//!
//! Turns tools discovered on MCP servers into tools a language model can
//! call. Each [`ModelTool`] takes a single `input` string (plus optional
//! JSON extras), maps it onto the tool's schema through an
//! [`ArgumentMapper`] and routes the call back to the connection it came
//! from.

pub mod bridge;
pub mod describe;
pub mod error;
pub mod mapping;

pub use bridge::{ModelTool, ToolBridge, ToolSpec};
pub use describe::describe_tool;
pub use error::{ToolError, ToolResult};
pub use mapping::{ArgumentMapper, SchemaFieldMapper, DEFAULT_FALLBACK_KEY};
