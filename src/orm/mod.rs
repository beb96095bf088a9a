//! Query builder and model facade.

pub mod builder;
pub mod filter;
pub mod model;

pub use builder::{Clause, QueryBuilder, SortDirection};
pub use model::{Model, collection_name};
