//! Core types shared across the view layer.

use serde::Serialize;
use serde_json::Value;

/// Keywords carrying a schema identifier, in lookup order.
pub const ID_KEYWORDS: &[&str] = &["$id", "id"];

/// Keywords whose value is a single subschema.
pub const SCHEMA_KEYWORDS: &[&str] = &["additionalProperties", "additionalItems", "not", "items"];

/// Keywords whose value maps names to subschemas.
pub const SCHEMA_MAP_KEYWORDS: &[&str] = &["properties", "patternProperties", "definitions", "$defs"];

/// Keywords whose value is an array of subschemas.
pub const SCHEMA_ARRAY_KEYWORDS: &[&str] = &["allOf", "anyOf", "oneOf", "items"];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Structural capability of a value or of the values a schema describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// Keyed container (JSON object).
    Object,
    /// Indexed container (JSON array).
    Array,
    /// Anything else.
    Scalar,
}

impl Shape {
    /// Shape of a concrete value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => Shape::Object,
            Value::Array(_) => Shape::Array,
            _ => Shape::Scalar,
        }
    }

    pub fn is_object(self) -> bool {
        self == Shape::Object
    }

    pub fn is_array(self) -> bool {
        self == Shape::Array
    }
}

/// Reads the `$id`/`id` keyword of a schema body, if it is a string.
pub fn declared_id(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    ID_KEYWORDS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
}
