//! Storage layer error types
//!
//! All errors that can occur while reading or writing the local mirror are
//! defined here.

use thiserror::Error;

use crate::catalog::{KeyError, SchemaError};
use crate::storage::types::InvalidNameError;

/// the main error type for mirror store operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying SQLite library
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// the table has never been synchronized into the mirror
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// invalid table or column name
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// the key value does not fit the table's key shape
    #[error("invalid key for table {table}: {source}")]
    InvalidKey {
        table: String,
        #[source]
        source: KeyError,
    },

    /// a row with the same key already exists
    #[error("duplicate key in table {table}: {key}")]
    DuplicateKey { table: String, key: String },

    /// the write names a column the local table does not have
    #[error("unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    /// the schema handed to `sync_schema` is malformed
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl StorageError {
    pub(crate) fn invalid_key(table: &str, source: KeyError) -> Self {
        StorageError::InvalidKey {
            table: table.to_string(),
            source,
        }
    }

    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::TableNotFound(_))
    }

    /// check if this error is a caller contract violation rather than a fault
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            StorageError::InvalidName(_)
                | StorageError::InvalidKey { .. }
                | StorageError::DuplicateKey { .. }
                | StorageError::UnknownColumn { .. }
                | StorageError::Schema(_)
        )
    }

    /// check if the operation may succeed when tried again
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
