//! Out-of-band storage for large binary values.
//!
//! Payloads live as files under a managed `media_files/` directory. Rows
//! only ever hold the reference string; reads turn it into a URL against a
//! configured base location.

mod error;
mod store;

pub use error::{MediaError, MediaResult};
pub use store::{Media, MediaStore, MediaUrl, DEFAULT_BASE_URL, REFERENCE_PREFIX};
