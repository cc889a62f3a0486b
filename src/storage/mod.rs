//! Storage layer: the local SQLite mirror of the remote tables.
//!
//! One physical table per logical table. Structured values are stored as
//! JSON text and media values as reference strings, both through the
//! [`crate::codec`] module. Upper layers never touch rusqlite directly.
//!
//! # Usage
//!
//! ```ignore
//! use tablemirror::catalog::{KeyShape, TableSchema};
//! use tablemirror::storage::MirrorStore;
//!
//! let store = MirrorStore::open("local.db")?;
//! let key = KeyShape::Single("uid".into());
//! store.sync_schema(&TableSchema::from_remote("scores", [("uid", "string")], key.clone()))?;
//! let id = store.insert("scores", &key, json!({"uid": "u1"}).as_object().unwrap())?;
//! let row = store.get_by_key("scores", &key, &id)?;
//! ```

mod error;
mod mirror;
mod types;

pub use error::{StorageError, StorageResult};
pub use mirror::MirrorStore;
pub use types::{
    validate_identifier, InvalidNameError, Record, SchemaChange, TableName, WriteOutcome,
};
