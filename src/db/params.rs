//! Parameter binding utilities for database queries.
//!
//! This module provides functions to bind `FieldValue`s to database-specific
//! query objects, in the order they appear in the slice.

use crate::models::FieldValue;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q FieldValue,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        FieldValue::Null => query.bind(None::<String>),
        FieldValue::Bool(v) => query.bind(*v),
        FieldValue::Int(v) => query.bind(*v),
        FieldValue::Float(v) => query.bind(*v),
        FieldValue::Date(v) => query.bind(*v),
        FieldValue::Text(v) => query.bind(v.as_str()),
        FieldValue::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q FieldValue,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        FieldValue::Null => query.bind(None::<String>),
        FieldValue::Bool(v) => query.bind(*v),
        FieldValue::Int(v) => query.bind(*v),
        FieldValue::Float(v) => query.bind(*v),
        FieldValue::Date(v) => query.bind(*v),
        FieldValue::Text(v) => query.bind(v.as_str()),
        FieldValue::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q FieldValue,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        FieldValue::Null => query.bind(None::<String>),
        FieldValue::Bool(v) => query.bind(*v),
        FieldValue::Int(v) => query.bind(*v),
        FieldValue::Float(v) => query.bind(*v),
        // Stored as RFC 3339 text so it reads back identically
        FieldValue::Date(v) => query.bind(v.to_rfc3339()),
        FieldValue::Text(v) => query.bind(v.as_str()),
        // SQLite doesn't have native JSON type, store as string
        FieldValue::Json(v) => query.bind(v.to_string()),
    }
}
