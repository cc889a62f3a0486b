//! File-backed media storage.

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{MediaError, MediaResult};

/// Prefix every media reference starts with.
///
/// It doubles as the name of the managed directory under the media root and
/// as the path namespace served by the external file endpoint.
pub const REFERENCE_PREFIX: &str = "media_files/";

/// Base location used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// A binary payload headed for the media store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    name: String,
    bytes: Vec<u8>,
}

impl Media {
    /// Create a payload with its original file name.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// An externally fetchable location for a stored payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUrl {
    url: String,
    reference: String,
}

impl MediaUrl {
    /// The full URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The stored reference this URL was resolved from.
    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl fmt::Display for MediaUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Stores payloads as files under `<root>/media_files/<table>/`.
///
/// File names combine the record identity, the column, a fresh ULID and the
/// original name, so writers on different rows never share a path and two
/// saves of the same payload never overwrite each other.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    base_url: String,
}

impl MediaStore {
    /// Open a media store rooted at `root`, creating the managed directory.
    pub fn open(root: impl AsRef<Path>, base_url: impl Into<String>) -> MediaResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(REFERENCE_PREFIX.trim_end_matches('/')))?;

        let base_url: String = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { root, base_url })
    }

    /// Check whether a string follows the media reference convention.
    pub fn is_reference(value: &str) -> bool {
        value.starts_with(REFERENCE_PREFIX) && value.len() > REFERENCE_PREFIX.len()
    }

    /// The base location references resolve against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The directory that holds the managed `media_files/` tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a payload and return its reference.
    ///
    /// The bytes are written to a temporary file, synced and renamed into
    /// place before the reference is returned, so a reference never points
    /// at a partially written file.
    pub fn save(
        &self,
        table: &str,
        column: &str,
        identity: &str,
        media: &Media,
    ) -> MediaResult<String> {
        let table_dir = sanitize(table);
        let file_name = format!(
            "{}_{}_{}_{}",
            sanitize(identity),
            sanitize(column),
            ulid::Ulid::new().to_string().to_lowercase(),
            sanitize(media.name()),
        );

        let dir = self.managed_dir().join(&table_dir);
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(media.bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(dir.join(&file_name)).map_err(|e| e.error)?;
        sync_dir(&dir)?;

        let reference = format!("{}{}/{}", REFERENCE_PREFIX, table_dir, file_name);
        debug!(
            table,
            column,
            identity,
            bytes = media.bytes().len(),
            reference = %reference,
            "saved media payload"
        );
        Ok(reference)
    }

    /// Turn a stored reference into an external location.
    pub fn resolve(&self, reference: &str) -> MediaResult<MediaUrl> {
        if !Self::is_reference(reference) {
            return Err(MediaError::NotFound(reference.to_string()));
        }
        Ok(MediaUrl {
            url: format!("{}/{}", self.base_url, reference),
            reference: reference.to_string(),
        })
    }

    /// Local file backing a reference.
    pub fn path_of(&self, reference: &str) -> MediaResult<PathBuf> {
        let relative = reference
            .strip_prefix(REFERENCE_PREFIX)
            .ok_or_else(|| MediaError::NotFound(reference.to_string()))?;

        let mut path = self.managed_dir();
        for part in relative.split('/') {
            if part.is_empty() || part == "." || part == ".." {
                return Err(MediaError::InvalidReference(reference.to_string()));
            }
            path.push(part);
        }
        Ok(path)
    }

    /// Read the bytes behind a reference.
    pub fn load(&self, reference: &str) -> MediaResult<Vec<u8>> {
        let path = self.path_of(reference)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MediaError::NotFound(reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn managed_dir(&self) -> PathBuf {
        self.root.join(REFERENCE_PREFIX.trim_end_matches('/'))
    }
}

/// Keep a path component to a conservative character set.
fn sanitize(part: &str) -> String {
    let mut cleaned: String = part
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", "_");
    }

    match cleaned.trim_matches('.') {
        "" => "blob".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> MediaResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> MediaResult<()> {
    Ok(())
}
