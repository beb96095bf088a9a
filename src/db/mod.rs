//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Statement execution over sqlx pools (PostgreSQL, MySQL, SQLite)
//! - The MongoDB document store
//! - Connection lifecycle management
//! - Parameter binding and row decoding

pub mod document;
pub mod executor;
pub mod params;
pub mod pool;
pub mod types;

pub use document::{DocumentStore, FindOptions};
pub use executor::{
    Executor, InsertStrategy, MySqlExecutor, PgExecutor, PlaceholderStyle, SqliteExecutor,
    StatementKind, WriteOutcome,
};
pub use pool::{Backend, Connection, ConnectionManager};
