//! Catalog module: table schemas, column types and key shapes.
//!
//! Schemas are derived from the remote authority and applied additively to
//! the local mirror. Key shapes are resolved per table by a single
//! [`KeyResolver`].

mod keys;
mod schema;
mod types;

pub use keys::{KeyError, KeyResolver, KeyShape, KeyValue, DEFAULT_KEY_FIELD};
pub use schema::{SchemaBuilder, SchemaError, TableSchema};
pub use types::{ColumnDef, DataType};
