//! Data models for the data-access layer.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use connection::{BackendKind, ConnectionConfig, ConnectionConfigError};
pub use schema::{FieldDefinition, FieldType, RecordBuilder, Schema};
pub use value::{FieldValue, Record, to_record};
