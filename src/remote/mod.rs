//! The call boundary to the authoritative table service.
//!
//! The mirror only depends on [`RemoteBridge`]. The transport behind it is
//! someone else's concern; [`InMemoryRemote`] stands in for it in tests and
//! local tooling.

mod error;
mod memory;

pub use error::{RemoteError, RemoteResult};
pub use memory::{InMemoryRemote, RemoteCall};

use crate::catalog::{ColumnDef, KeyValue};
use crate::storage::Record;

/// Synchronous calls against the remote authority.
///
/// Every call is independently fallible. `update` and `delete` are expected
/// to be idempotent, `insert` is not.
pub trait RemoteBridge: Send + Sync {
    /// Every row of a table.
    fn fetch_all(&self, table: &str) -> RemoteResult<Vec<Record>>;

    /// Add a row and return the key the remote assigned or accepted.
    fn insert(&self, table: &str, fields: &Record) -> RemoteResult<KeyValue>;

    /// Set `fields` on the row matching `key`.
    fn update(&self, table: &str, key: &KeyValue, fields: &Record) -> RemoteResult<()>;

    /// Remove the row matching `key`.
    fn delete(&self, table: &str, key: &KeyValue) -> RemoteResult<()>;

    /// Column definitions of a table.
    fn schema(&self, table: &str) -> RemoteResult<Vec<ColumnDef>>;
}
