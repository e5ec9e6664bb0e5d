//! Tool descriptions for the model.
//!
//! The server's description is extended with the required parameters so the
//! model knows what to pass:
//!
//! ```text
//! Get the weather forecast for a city
//!
//! Required parameters:
//! - city: City name (string). Allowed values: Tokyo, Osaka
//! ```

use chatlink_mcp::{FieldSchema, InputSchema};
use std::fmt::Write;

/// Enums up to this size are listed in full.
pub const MAX_LISTED_VALUES: usize = 20;

/// How many values are shown for longer enums.
pub const TRUNCATED_VALUES: usize = 10;

/// Build the description offered to the model.
pub fn describe_tool(name: &str, description: Option<&str>, schema: Option<&InputSchema>) -> String {
    let mut text = match description.map(str::trim) {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => format!("MCP tool: {name}"),
    };

    let Some(schema) = schema else {
        return text;
    };
    if schema.required.is_empty() {
        return text;
    }

    text.push_str("\n\nRequired parameters:");
    for (field, field_schema) in schema.required_fields() {
        text.push('\n');
        text.push_str(&describe_field(field, field_schema));
    }
    text
}

fn describe_field(name: &str, schema: Option<&FieldSchema>) -> String {
    let Some(schema) = schema else {
        return format!("- {name}: {name}");
    };

    let mut line = format!(
        "- {name}: {}",
        schema.description.as_deref().unwrap_or(name)
    );
    if let Some(field_type) = &schema.field_type {
        let _ = write!(line, " ({field_type})");
    }
    if !schema.enum_values.is_empty() {
        let _ = write!(line, ". Allowed values: {}", allowed_values(&schema.enum_values));
    }
    line
}

/// Render an enum, truncating long lists.
pub fn allowed_values(values: &[String]) -> String {
    if values.len() <= MAX_LISTED_VALUES {
        return values.join(", ");
    }
    format!(
        "{}, ...and {} more",
        values[..TRUNCATED_VALUES].join(", "),
        values.len() - TRUNCATED_VALUES
    )
}
