//! Polyglot data-access library
//!
//! One connection manager, one fluent query builder and one model facade over
//! PostgreSQL, MySQL, SQLite and MongoDB. Callers work with plain [`Record`]s
//! and never branch on the backend kind.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod orm;

pub use config::{Config, DatabaseConfig, PoolOptions};
pub use db::{Connection, ConnectionManager, DocumentStore, Executor};
pub use error::{DbError, DbResult};
pub use models::{BackendKind, ConnectionConfig, FieldValue, Record, Schema};
pub use orm::{Model, QueryBuilder, SortDirection};
