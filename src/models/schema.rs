//! Model schema definitions.
//!
//! A [`Schema`] describes the fields of a model. It is descriptive only: the
//! model facade never validates data against it. Callers who want checking opt
//! in through [`RecordBuilder`].

use crate::error::{DbError, DbResult};
use crate::models::value::{FieldValue, Record};
use serde::{Deserialize, Serialize};

/// Logical field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Json,
    /// Primary or foreign key: integer for relational rows, hex string for documents
    Identifier,
}

impl FieldType {
    /// Check whether a value is acceptable for this field type.
    ///
    /// NULL is accepted everywhere; `required` is checked separately.
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (_, FieldValue::Null) => true,
            (Self::String, FieldValue::Text(_)) => true,
            (Self::Number, FieldValue::Int(_) | FieldValue::Float(_)) => true,
            (Self::Boolean, FieldValue::Bool(_)) => true,
            (Self::Date, FieldValue::Date(_)) => true,
            // Dates may arrive as their RFC 3339 text
            (Self::Date, FieldValue::Text(s)) => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
            (Self::Json, _) => true,
            (Self::Identifier, FieldValue::Int(_) | FieldValue::Text(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Json => "json",
            Self::Identifier => "identifier",
        };
        write!(f, "{}", name)
    }
}

/// Definition of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
}

impl FieldDefinition {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            primary: false,
            unique: false,
            required: false,
            default: None,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Ordered mapping from field name to definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<(String, FieldDefinition)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field definition.
    pub fn field(mut self, name: impl Into<String>, definition: FieldDefinition) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = definition,
            None => self.fields.push((name, definition)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, def)| def)
    }

    /// Iterate fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDefinition)> {
        self.fields.iter().map(|(n, d)| (n.as_str(), d))
    }

    /// Name of the first field marked primary, if any.
    pub fn primary_key(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|(_, def)| def.primary)
            .map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Start building a record checked against this schema.
    pub fn record(&self) -> RecordBuilder<'_> {
        RecordBuilder {
            schema: self,
            values: Vec::new(),
        }
    }
}

/// Builds a [`Record`] whose fields are checked against a [`Schema`].
#[derive(Debug)]
pub struct RecordBuilder<'a> {
    schema: &'a Schema,
    values: Vec<(String, FieldValue)>,
}

impl RecordBuilder<'_> {
    /// Set a field, rejecting undeclared fields and mismatched types.
    pub fn set(mut self, field: &str, value: impl Into<FieldValue>) -> DbResult<Self> {
        let value = value.into();
        let definition = self.schema.get(field).ok_or_else(|| {
            DbError::invalid_input(format!("Field '{}' is not declared in the schema", field))
        })?;

        if !definition.field_type.accepts(&value) {
            return Err(DbError::invalid_input(format!(
                "Field '{}' expects {}, got {}",
                field,
                definition.field_type,
                value.type_name()
            )));
        }

        match self.values.iter_mut().find(|(n, _)| n == field) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((field.to_string(), value)),
        }
        Ok(self)
    }

    /// Apply defaults and check required fields.
    pub fn build(self) -> DbResult<Record> {
        let mut record = Record::new();

        for (name, definition) in self.schema.fields() {
            let value = self
                .values
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .or_else(|| definition.default.clone());

            match value {
                Some(v) if !(definition.required && v.is_null()) => {
                    record.insert(name.to_string(), v.to_json());
                }
                // Primary keys are usually generated by the backend
                _ if definition.required && !definition.primary => {
                    return Err(DbError::invalid_input(format!(
                        "Field '{}' is required",
                        name
                    )));
                }
                _ => {}
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_schema() -> Schema {
        Schema::new()
            .field("id", FieldDefinition::new(FieldType::Identifier).primary())
            .field("name", FieldDefinition::new(FieldType::String).required())
            .field("email", FieldDefinition::new(FieldType::String).unique())
            .field("age", FieldDefinition::new(FieldType::Number))
            .field(
                "active",
                FieldDefinition::new(FieldType::Boolean).default_value(true),
            )
    }

    #[test]
    fn test_schema_lookup() {
        let schema = user_schema();
        assert_eq!(schema.len(), 5);
        assert_eq!(schema.primary_key(), Some("id"));
        assert!(schema.get("email").unwrap().unique);
        assert!(schema.get("missing").is_none());
        let names: Vec<&str> = schema.fields().map(|(n, _)| n).collect();
        assert_eq!(names, ["id", "name", "email", "age", "active"]);
    }

    #[test]
    fn test_field_redefinition_replaces() {
        let schema = Schema::new()
            .field("age", FieldDefinition::new(FieldType::String))
            .field("age", FieldDefinition::new(FieldType::Number));
        assert_eq!(schema.len(), 1);
        assert_eq!(schema.get("age").unwrap().field_type, FieldType::Number);
    }

    #[test]
    fn test_record_builder_applies_defaults() {
        let schema = user_schema();
        let record = schema
            .record()
            .set("name", "Alice")
            .unwrap()
            .set("age", 30)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            serde_json::Value::Object(record),
            json!({"name": "Alice", "age": 30, "active": true})
        );
    }

    #[test]
    fn test_record_builder_rejects_bad_input() {
        let schema = user_schema();
        assert!(schema.record().set("nickname", "Al").is_err());
        assert!(schema.record().set("age", "thirty").is_err());

        let err = schema.record().set("age", 1).unwrap().build().unwrap_err();
        assert!(err.to_string().contains("'name' is required"));
    }

    #[test]
    fn test_date_accepts_rfc3339_text() {
        assert!(FieldType::Date.accepts(&FieldValue::from("2024-01-02T03:04:05Z")));
        assert!(!FieldType::Date.accepts(&FieldValue::from("yesterday")));
    }

    #[test]
    fn test_schema_deserialize() {
        let schema: Schema = serde_json::from_value(json!([
            ["id", {"type": "identifier", "primary": true}],
            ["title", {"type": "string", "required": true}]
        ]))
        .unwrap();
        assert_eq!(schema.primary_key(), Some("id"));
        assert!(schema.get("title").unwrap().required);
    }
}
