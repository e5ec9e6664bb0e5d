//! Typed view of a tool's JSON input schema.
//!
//! Servers send a JSON-schema-like object: `{"type": "object",
//! "properties": {...}, "required": [...]}`. Some wrap it one level deep
//! under a marker key (`{"some": {...}}`). The schema is decoded once when a
//! tool is read off the wire; callers never look at the raw JSON again.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key some servers use to wrap an optional schema.
const WRAPPER_KEY: &str = "some";

/// One declared property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSchema {
    /// Declared `type`, if any.
    pub field_type: Option<String>,
    pub description: Option<String>,
    /// Allowed values from `enum`, rendered as text.
    pub enum_values: Vec<String>,
}

impl FieldSchema {
    fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let field_type = match obj.get("type") {
            Some(Value::String(t)) => Some(t.clone()),
            // `["string", "null"]` style unions
            Some(Value::Array(types)) => {
                let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
                (!names.is_empty()).then(|| names.join(" | "))
            }
            _ => None,
        };

        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.trim().is_empty())
            .map(str::to_string);

        let enum_values = obj
            .get("enum")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(render_enum_value).collect())
            .unwrap_or_default();

        Self {
            field_type,
            description,
            enum_values,
        }
    }
}

fn render_enum_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decoded tool input schema.
///
/// `properties` keeps declaration order so "first declared property" is
/// meaningful.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct InputSchema {
    pub schema_type: Option<String>,
    pub properties: Vec<(String, FieldSchema)>,
    pub required: Vec<String>,
    raw: Value,
}

impl InputSchema {
    /// Decode a schema, unwrapping one level of nesting if present.
    pub fn from_json(value: &Value) -> Self {
        let inner = unwrap_schema(value);
        let Some(obj) = inner.as_object() else {
            return Self {
                raw: value.clone(),
                ..Self::default()
            };
        };

        let schema_type = obj.get("type").and_then(Value::as_str).map(str::to_string);

        let properties = obj
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, field)| (name.clone(), FieldSchema::from_json(field)))
                    .collect()
            })
            .unwrap_or_default();

        let required = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            schema_type,
            properties,
            required,
            raw: value.clone(),
        }
    }

    /// The schema exactly as the server sent it.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Look up a declared property.
    pub fn property(&self, name: &str) -> Option<&FieldSchema> {
        self.properties
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, schema)| schema)
    }

    /// First required field, else first declared property.
    pub fn primary_field(&self) -> Option<&str> {
        self.required
            .first()
            .or_else(|| self.properties.first().map(|(name, _)| name))
            .map(String::as_str)
    }

    /// Required fields in declared order, with their schema when declared.
    pub fn required_fields(&self) -> impl Iterator<Item = (&str, Option<&FieldSchema>)> {
        self.required
            .iter()
            .map(move |name| (name.as_str(), self.property(name)))
    }

    /// True when the schema declares neither properties nor required fields.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.required.is_empty()
    }
}

impl From<Value> for InputSchema {
    fn from(value: Value) -> Self {
        Self::from_json(&value)
    }
}

impl From<InputSchema> for Value {
    fn from(schema: InputSchema) -> Self {
        schema.raw
    }
}

/// Strip one level of wrapping around a schema object.
///
/// A schema that already declares `properties`, `required` or `type` is
/// returned as is. Otherwise a `some` key, or a single key whose object
/// value declares `properties`, is unwrapped.
fn unwrap_schema(value: &Value) -> &Value {
    let Some(obj) = value.as_object() else {
        return value;
    };

    if looks_like_schema(obj) {
        return value;
    }

    if let Some(inner @ Value::Object(_)) = obj.get(WRAPPER_KEY) {
        return inner;
    }

    if obj.len() == 1 {
        if let Some(inner @ Value::Object(inner_obj)) = obj.values().next() {
            if inner_obj.contains_key("properties") {
                return inner;
            }
        }
    }

    value
}

fn looks_like_schema(obj: &Map<String, Value>) -> bool {
    obj.contains_key("properties") || obj.contains_key("required") || obj.contains_key("type")
}
