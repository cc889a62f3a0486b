//! Remote bridge errors.

use thiserror::Error;

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failures reported by the remote authority or the transport in front of it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// the remote could not be reached or did not answer
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// the remote has no table by that name
    #[error("remote table not found: {0}")]
    TableNotFound(String),

    /// no remote row matched the key
    #[error("remote row not found in {table}: {key}")]
    RowNotFound { table: String, key: String },

    /// the remote refused the call
    #[error("remote rejected call: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::TableNotFound(_) | RemoteError::RowNotFound { .. })
    }

    /// check if the call may succeed when tried again
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }
}
