//! Fluent query builder.
//!
//! Clauses accumulate in call order and render to SQL for relational
//! connections or to a native filter for document connections. Placeholders
//! are rendered when each `where_` is applied, so parameter order always follows
//! `where_` call order no matter where limit or ordering calls fall.

use crate::db::document::FindOptions;
use crate::db::{Backend, Connection, PlaceholderStyle};
use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, FieldValue, Record};
use crate::orm::filter;
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::sync::Arc;

/// Direction of an `ORDER BY`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(DbError::invalid_input(format!(
                "Sort direction must be ASC or DESC, got '{}'",
                s
            ))),
        }
    }
}

/// One `field operator value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub operator: String,
    pub value: FieldValue,
    /// Rendered SQL condition with its placeholders
    sql: String,
}

/// A query against one collection.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    connection: Arc<Connection>,
    collection: String,
    clauses: Vec<Clause>,
    params: Vec<FieldValue>,
    order: Option<(String, SortDirection)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QueryBuilder {
    pub fn new(connection: Arc<Connection>, collection: impl Into<String>) -> Self {
        Self {
            connection,
            collection: collection.into(),
            clauses: Vec::new(),
            params: Vec::new(),
            order: None,
            limit: None,
            offset: None,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        match self.connection.backend() {
            Backend::Relational(executor) => executor.placeholder_style(),
            Backend::Document(_) => PlaceholderStyle::for_kind(self.connection.kind()),
        }
    }

    /// Add an AND-combined condition.
    ///
    /// The operator is passed through as written. `field` is interpolated as a
    /// raw identifier and must not come from untrusted input. `IN` and `NOT IN`
    /// with a non-empty JSON array expand to one placeholder per element.
    pub fn where_(
        mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Self {
        let field = field.into();
        let operator = operator.into();
        let value = value.into();
        let style = self.placeholder_style();

        let expands = matches!(
            operator.to_ascii_uppercase().as_str(),
            "IN" | "NOT IN"
        );
        let rendered = match &value {
            FieldValue::Json(JsonValue::Array(items)) if expands && !items.is_empty() => {
                let placeholders: Vec<String> = items
                    .iter()
                    .map(|item| {
                        self.params.push(FieldValue::from(item));
                        style.placeholder(self.params.len())
                    })
                    .collect();
                format!("({})", placeholders.join(", "))
            }
            _ => {
                self.params.push(value.clone());
                style.placeholder(self.params.len())
            }
        };

        self.clauses.push(Clause {
            sql: format!("{} {} {}", field, operator, rendered),
            field,
            operator,
            value,
        });
        self
    }

    /// Set the ordering, replacing any earlier one.
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            return String::new();
        }
        let conditions: Vec<&str> = self.clauses.iter().map(|c| c.sql.as_str()).collect();
        format!(" WHERE {}", conditions.join(" AND "))
    }

    /// Render the `SELECT` statement and its parameters.
    pub fn to_select_sql(&self) -> (String, Vec<FieldValue>) {
        let mut sql = format!("SELECT * FROM {}{}", self.collection, self.where_sql());

        if let Some((field, direction)) = &self.order {
            sql.push_str(&format!(" ORDER BY {} {}", field, direction.as_sql()));
        }

        match (self.limit, self.offset) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
            // MySQL and SQLite reject OFFSET without LIMIT
            (None, Some(_)) => match self.connection.kind() {
                BackendKind::RelationalPositional => sql.push_str(" LIMIT 18446744073709551615"),
                BackendKind::EmbeddedFile => sql.push_str(" LIMIT -1"),
                _ => {}
            },
            (None, None) => {}
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        (sql, self.params.clone())
    }

    /// Render the `COUNT(*)` statement and its parameters. Ordering and
    /// pagination are ignored.
    pub fn to_count_sql(&self) -> (String, Vec<FieldValue>) {
        (
            format!(
                "SELECT COUNT(*) AS count FROM {}{}",
                self.collection,
                self.where_sql()
            ),
            self.params.clone(),
        )
    }

    fn find_options(&self) -> FindOptions {
        FindOptions {
            sort: self
                .order
                .as_ref()
                .map(|(field, direction)| filter::to_sort(field, *direction)),
            limit: self.limit,
            skip: self.offset,
        }
    }

    pub async fn find_all(&self) -> DbResult<Vec<Record>> {
        match self.connection.backend() {
            Backend::Relational(executor) => {
                let (sql, params) = self.to_select_sql();
                executor.query(&sql, &params).await
            }
            Backend::Document(store) => {
                let filter = filter::to_document_filter(&self.clauses)?;
                store.find(&self.collection, filter, self.find_options()).await
            }
        }
    }

    /// First matching record, or `None`. The builder itself is left unchanged.
    pub async fn find_one(&self) -> DbResult<Option<Record>> {
        let records = self.clone().limit(1).find_all().await?;
        Ok(records.into_iter().next())
    }

    pub async fn count(&self) -> DbResult<u64> {
        match self.connection.backend() {
            Backend::Relational(executor) => {
                let (sql, params) = self.to_count_sql();
                let rows = executor.query(&sql, &params).await?;
                let count = rows.first().and_then(|row| row.get("count")).ok_or_else(|| {
                    DbError::internal("COUNT query returned no count column")
                })?;
                count_from_json(count)
            }
            Backend::Document(store) => {
                let filter = filter::to_document_filter(&self.clauses)?;
                store.count(&self.collection, filter).await
            }
        }
    }
}

fn count_from_json(value: &JsonValue) -> DbResult<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        // Some drivers hand back NUMERIC counts as text
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| DbError::internal(format!("Unexpected count value: {}", value)))
}
