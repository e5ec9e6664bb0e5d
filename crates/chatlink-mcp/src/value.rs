//! Argument and result values exchanged with MCP servers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Tagged union used for tool arguments.
///
/// Everything handed to `tools/call` is converted to this type first.
/// Numbers keep their JSON representation, so integers stay integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

/// Result of converting a native argument map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversion {
    pub values: BTreeMap<String, Value>,
    /// Top-level keys whose value could not be represented.
    pub dropped: Vec<String>,
}

impl Value {
    /// Convert a native JSON value.
    ///
    /// `null` has no argument representation and yields `None`; inside
    /// arrays and objects such entries are removed.
    pub fn from_native(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Bool(b)),
            serde_json::Value::Number(n) => Some(Value::Number(n)),
            serde_json::Value::String(s) => Some(Value::String(s)),
            serde_json::Value::Array(items) => Some(Value::Array(
                items.into_iter().filter_map(Value::from_native).collect(),
            )),
            serde_json::Value::Object(map) => Some(Value::Object(
                map.into_iter()
                    .filter_map(|(k, v)| Value::from_native(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }

    /// Convert an argument map, reporting the keys that were dropped.
    pub fn convert_arguments<I>(arguments: I) -> Conversion
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        let mut conversion = Conversion::default();
        for (key, value) in arguments {
            match Value::from_native(value) {
                Some(v) => {
                    conversion.values.insert(key, v);
                }
                None => conversion.dropped.push(key),
            }
        }

        if !conversion.dropped.is_empty() {
            warn!(keys = ?conversion.dropped, "Dropped tool arguments without a value representation");
        }
        conversion
    }

    /// Convert back to native JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Convert a whole argument map back to a JSON object.
    pub fn map_to_json(values: &BTreeMap<String, Value>) -> serde_json::Value {
        serde_json::Value::Object(
            values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}
