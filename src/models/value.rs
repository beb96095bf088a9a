//! Field values and records.
//!
//! `FieldValue` is the tagged value bound into statements; `Record` is the
//! plain field-name-to-value map every backend hands back.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A row or document, keyed by field name.
///
/// The identifier is always exposed as `id`, whatever the backend calls it.
pub type Record = serde_json::Map<String, JsonValue>;

/// Convert a JSON object into a [`Record`].
pub fn to_record(value: JsonValue) -> DbResult<Record> {
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(DbError::invalid_input(format!(
            "Expected a JSON object for a record, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// NULL value
    Null,
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    /// Dates are tried before plain text so RFC 3339 strings keep their type
    Date(DateTime<Utc>),
    Text(String),
    /// Arrays and objects
    Json(JsonValue),
}

impl FieldValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Date(_) => "date",
            Self::Text(_) => "text",
            Self::Json(_) => "json",
        }
    }

    /// Convert back to a JSON value.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(v) => JsonValue::Bool(*v),
            Self::Int(v) => JsonValue::Number((*v).into()),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Date(v) => JsonValue::String(v.to_rfc3339()),
            Self::Text(v) => JsonValue::String(v.clone()),
            Self::Json(v) => v.clone(),
        }
    }

    /// Borrow the text of a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<JsonValue> for FieldValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(v) => Self::Bool(v),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    // u64 beyond i64::MAX degrades to a float, as in JSON itself
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Self::Text(s),
            other => Self::Json(other),
        }
    }
}

impl From<&JsonValue> for FieldValue {
    fn from(value: &JsonValue) -> Self {
        Self::from(value.clone())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(v) => write!(f, "{}", v),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_value_types() {
        assert!(FieldValue::Null.is_null());
        assert!(!FieldValue::Bool(true).is_null());
        assert_eq!(FieldValue::Int(42).type_name(), "int");
        assert_eq!(FieldValue::from("hello").type_name(), "text");
    }

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(FieldValue::from(json!(7)), FieldValue::Int(7));
        assert_eq!(FieldValue::from(json!(2.5)), FieldValue::Float(2.5));
        assert_eq!(
            FieldValue::from(json!({"a": 1})),
            FieldValue::Json(json!({"a": 1}))
        );
        assert_eq!(FieldValue::from(json!(null)), FieldValue::Null);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some("x")), FieldValue::Text("x".into()));
    }

    #[test]
    fn test_to_json_round_trip_for_date() {
        let date = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            FieldValue::Date(date).to_json(),
            json!("2024-05-01T10:00:00+00:00")
        );
    }

    #[test]
    fn test_untagged_deserialize_prefers_date() {
        let value: FieldValue = serde_json::from_str("\"2024-05-01T10:00:00Z\"").unwrap();
        assert_eq!(value.type_name(), "date");
        let value: FieldValue = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(value, FieldValue::Text("alice".into()));
    }

    #[test]
    fn test_to_record() {
        let record = to_record(json!({"name": "Alice", "age": 30})).unwrap();
        assert_eq!(record["age"], json!(30));

        let err = to_record(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("array"));
    }
}
