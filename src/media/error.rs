//! Media store errors.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors raised by the media store.
#[derive(Debug, Error)]
pub enum MediaError {
    /// the token does not follow the reference convention, or no file backs it
    #[error("media reference not found: {0}")]
    NotFound(String),

    /// the reference tries to escape the managed directory
    #[error("invalid media reference: {0}")]
    InvalidReference(String),

    /// filesystem failure while writing or reading a payload
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// check if this error means the payload does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, MediaError::NotFound(_))
    }
}
