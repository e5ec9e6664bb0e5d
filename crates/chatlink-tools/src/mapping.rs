//! Mapping model arguments onto a tool's input schema.
//!
//! The model fills a single `input` string plus an optional JSON object of
//! extra arguments. The mapper decides which schema field `input` belongs
//! to and merges the extras on top.

use chatlink_mcp::{Conversion, InputSchema, Value};
use serde_json::Map;
use tracing::debug;

/// Key used when the schema gives no hint.
pub const DEFAULT_FALLBACK_KEY: &str = "city";

/// Turns model-supplied arguments into a tool argument map.
pub trait ArgumentMapper: Send + Sync {
    /// Field that receives the model's `input` value.
    fn input_field(&self, schema: Option<&InputSchema>) -> String;

    fn prepare_arguments(
        &self,
        schema: Option<&InputSchema>,
        input: &str,
        additional_args: Option<&str>,
    ) -> Conversion;
}

/// Puts `input` under the schema's primary field.
///
/// The field is the first required one, else the first declared property,
/// else `fallback_key`.
#[derive(Debug, Clone)]
pub struct SchemaFieldMapper {
    pub fallback_key: String,
}

impl SchemaFieldMapper {
    pub fn new(fallback_key: impl Into<String>) -> Self {
        Self {
            fallback_key: fallback_key.into(),
        }
    }

    /// Field that receives the primary input.
    pub fn primary_field<'a>(&'a self, schema: Option<&'a InputSchema>) -> &'a str {
        schema
            .and_then(InputSchema::primary_field)
            .unwrap_or(&self.fallback_key)
    }
}

impl Default for SchemaFieldMapper {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_KEY)
    }
}

impl ArgumentMapper for SchemaFieldMapper {
    fn input_field(&self, schema: Option<&InputSchema>) -> String {
        self.primary_field(schema).to_string()
    }

    fn prepare_arguments(
        &self,
        schema: Option<&InputSchema>,
        input: &str,
        additional_args: Option<&str>,
    ) -> Conversion {
        let mut arguments = Map::new();
        arguments.insert(
            self.primary_field(schema).to_string(),
            serde_json::Value::String(input.to_string()),
        );

        if let Some(extra) = additional_args.and_then(parse_additional) {
            for (key, value) in extra {
                arguments.insert(key, value);
            }
        }

        Value::convert_arguments(arguments)
    }
}

/// Parse the secondary argument object. Blank, `{}`, malformed and
/// non-object input yields `None`.
fn parse_additional(raw: &str) -> Option<Map<String, serde_json::Value>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "{}" {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        Ok(other) => {
            debug!(value = %other, "Ignoring additional arguments that are not an object");
            None
        }
        Err(e) => {
            debug!(error = %e, "Ignoring malformed additional arguments");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlink_test_utils::fixtures;
    use serde_json::json;

    fn schema(value: serde_json::Value) -> InputSchema {
        InputSchema::from_json(&value)
    }

    fn prepared(schema: Option<&InputSchema>, input: &str, extra: Option<&str>) -> serde_json::Value {
        let conversion = SchemaFieldMapper::default().prepare_arguments(schema, input, extra);
        Value::map_to_json(&conversion.values)
    }

    #[test]
    fn test_first_required_field() {
        let s = schema(json!({
            "properties": {"days": {"type": "integer"}, "city": {"type": "string"}},
            "required": ["city"]
        }));
        assert_eq!(prepared(Some(&s), "Tokyo", None), json!({"city": "Tokyo"}));
    }

    #[test]
    fn test_first_declared_property() {
        let s = schema(json!({
            "properties": {"query": {"type": "string"}, "limit": {"type": "integer"}}
        }));
        assert_eq!(prepared(Some(&s), "rust", None), json!({"query": "rust"}));
    }

    #[test]
    fn test_fallback_key() {
        assert_eq!(prepared(None, "Osaka", None), json!({"city": "Osaka"}));
        assert_eq!(prepared(Some(&schema(json!({}))), "Osaka", None), json!({"city": "Osaka"}));

        let mapper = SchemaFieldMapper::new("q");
        let conversion = mapper.prepare_arguments(None, "x", None);
        assert_eq!(Value::map_to_json(&conversion.values), json!({"q": "x"}));
    }

    #[test]
    fn test_additional_args_merged_and_win() {
        let s = schema(fixtures::weather_schema());
        assert_eq!(
            prepared(Some(&s), "Tokyo", Some(r#"{"days": 3, "city": "Kyoto"}"#)),
            json!({"city": "Kyoto", "days": 3})
        );
    }

    #[test]
    fn test_additional_args_ignored() {
        let s = schema(fixtures::weather_schema());
        for extra in ["", "{}", "  ", "not json", "[1,2]", "\"text\""] {
            assert_eq!(
                prepared(Some(&s), "Tokyo", Some(extra)),
                json!({"city": "Tokyo"}),
                "extra = {extra:?}"
            );
        }
    }

    #[test]
    fn test_null_extra_reported() {
        let conversion = SchemaFieldMapper::default().prepare_arguments(
            None,
            "Tokyo",
            Some(r#"{"units": null}"#),
        );
        assert_eq!(conversion.dropped, vec!["units"]);
        assert_eq!(conversion.values.len(), 1);
    }

    #[test]
    fn test_deterministic() {
        let s = schema(fixtures::weather_schema());
        let mapper = SchemaFieldMapper::default();
        let a = mapper.prepare_arguments(Some(&s), "Tokyo", Some(r#"{"days": 2}"#));
        let b = mapper.prepare_arguments(Some(&s), "Tokyo", Some(r#"{"days": 2}"#));
        assert_eq!(a, b);
    }
}
