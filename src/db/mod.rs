//! High-level mirror API.
//!
//! [`Database`] owns the mirror store, media store and key resolver, and
//! hands out [`Table`] handles. Tables produce [`LiveRow`]s, which write
//! every change straight through to the mirror and, when replication is on,
//! to the remote authority.

mod api;
mod config;
mod row;
mod table;

pub use api::{Database, DatabaseError, DatabaseResult};
pub use config::{MirrorConfig, BASE_URL_ENV, DB_ENV, MEDIA_ROOT_ENV, REPLICATE_ENV};
pub use row::{LiveRow, RowValue};
pub use table::{Cell, RowValues, Table};
