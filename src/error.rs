//! Error types for the data-access layer.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Backend failures keep the driver's native message so callers can see exactly
//! what the engine reported.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        /// e.g., "42P01" for undefined table, "1062" for a MySQL duplicate key
        sql_state: Option<String>,
    },

    #[error("Unsupported operation: {operation} is not available on a {backend} connection")]
    UnsupportedOperation { operation: String, backend: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a query error with optional SQL state.
    pub fn query(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql_state,
        }
    }

    /// Create an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>, backend: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
            backend: backend.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Check if this is a statement the engine refused to parse.
    ///
    /// Engines without `RETURNING` support reject it as a syntax error, so this
    /// is the only class of failure an insert may recover from.
    pub fn is_syntax_error(&self) -> bool {
        match self {
            Self::Query { message, sql_state } => {
                let code_matches = matches!(sql_state.as_deref(), Some("42601" | "42000" | "1064"));
                let lower = message.to_lowercase();
                code_matches
                    || lower.contains("syntax error")
                    || lower.contains("near \"returning\"")
                    || (lower.contains("returning") && lower.contains("not supported"))
            }
            _ => false,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// Connect paths map their failures to `Connection` explicitly; everything that
/// reaches this conversion happened against an established pool.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::query(db_err.message(), code)
            }
            sqlx::Error::PoolClosed => {
                DbError::query("Connection pool is closed; reconnect before issuing queries", None)
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            other => DbError::query(other.to_string(), None),
        }
    }
}

impl From<mongodb::error::Error> for DbError {
    fn from(err: mongodb::error::Error) -> Self {
        let code = match err.kind.as_ref() {
            mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(e)) => {
                Some(e.code.to_string())
            }
            mongodb::error::ErrorKind::Command(e) => Some(e.code.to_string()),
            _ => None,
        };
        DbError::query(err.to_string(), code)
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::connection("refused", "Start the server");
        assert_eq!(err.suggestion(), Some("Start the server"));
        assert_eq!(DbError::query("boom", None).suggestion(), None);
    }

    #[test]
    fn test_query_error_keeps_native_message() {
        let err = DbError::query("UNIQUE constraint failed: users.email", Some("2067".into()));
        assert!(err.to_string().contains("UNIQUE constraint failed: users.email"));
    }

    #[test]
    fn test_unsupported_display() {
        let err = DbError::unsupported("document_store", "embedded-file");
        assert_eq!(
            err.to_string(),
            "Unsupported operation: document_store is not available on a embedded-file connection"
        );
    }

    #[test]
    fn test_syntax_error_detection() {
        assert!(DbError::query("near \"RETURNING\": syntax error", None).is_syntax_error());
        assert!(DbError::query("You have an error in your SQL", Some("42000".into())).is_syntax_error());
        assert!(DbError::query("syntax error at or near \"x\"", Some("42601".into())).is_syntax_error());
        assert!(
            !DbError::query("UNIQUE constraint failed: users.email", Some("2067".into()))
                .is_syntax_error()
        );
        assert!(!DbError::connection("syntax error", "n/a").is_syntax_error());
    }

    #[test]
    fn test_returning_identifier_is_not_syntax_error() {
        let err = DbError::query("UNIQUE constraint failed: orders.returning_code", Some("2067".into()));
        assert!(!err.is_syntax_error());
        assert!(!DbError::query("no such column: returning_code", None).is_syntax_error());
        assert!(DbError::query("near \"RETURNING\": unexpected token", None).is_syntax_error());
        assert!(DbError::query("RETURNING is not supported here", None).is_syntax_error());
    }

    #[test]
    fn test_closed_pool_is_query_error() {
        let err = DbError::from(sqlx::Error::PoolClosed);
        assert!(matches!(err, DbError::Query { .. }));
        assert!(!err.is_connection_error());
        assert!(!err.is_syntax_error());
    }

    #[test]
    fn test_connection_error_flag() {
        assert!(DbError::connection("err", "sugg").is_connection_error());
        assert!(!DbError::invalid_input("bad").is_connection_error());
    }
}
