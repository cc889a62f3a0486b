//! Mirror configuration.

use std::path::{Path, PathBuf};

use crate::media::DEFAULT_BASE_URL;

/// Environment variable naming the mirror database file.
pub const DB_ENV: &str = "TABLEMIRROR_DB";
/// Environment variable naming the directory that holds `media_files/`.
pub const MEDIA_ROOT_ENV: &str = "TABLEMIRROR_MEDIA_ROOT";
/// Environment variable overriding the media base location.
pub const BASE_URL_ENV: &str = "TABLEMIRROR_BASE_URL";
/// Environment variable enabling dual writes to the remote authority.
pub const REPLICATE_ENV: &str = "TABLEMIRROR_REPLICATE";

/// Mirror configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    /// Path to the SQLite file.
    pub path: PathBuf,
    /// Directory holding `media_files/`. Defaults to the database's directory.
    pub media_root: Option<PathBuf>,
    /// Base location media references resolve against.
    pub base_url: Option<String>,
    /// Propagate every write to the remote authority.
    pub replicate: bool,
    /// Create the database file if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("local.db"),
            media_root: None,
            base_url: None,
            replicate: false,
            create_if_missing: true,
        }
    }
}

impl MirrorConfig {
    /// Create a new configuration with the given database path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Build a configuration from `TABLEMIRROR_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup(DB_ENV).filter(|v| !v.is_empty()) {
            config.path = PathBuf::from(path);
        }
        config.media_root = lookup(MEDIA_ROOT_ENV).filter(|v| !v.is_empty()).map(PathBuf::from);
        config.base_url = lookup(BASE_URL_ENV).filter(|v| !v.is_empty());
        config.replicate = lookup(REPLICATE_ENV).is_some_and(|v| parse_flag(&v));
        config
    }

    /// Set the media root directory.
    pub fn media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.media_root = Some(root.into());
        self
    }

    /// Set the media base location.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set replicate flag.
    pub fn replicate(mut self, value: bool) -> Self {
        self.replicate = value;
        self
    }

    /// Set create_if_missing flag.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// The directory that holds `media_files/`.
    pub fn media_dir(&self) -> PathBuf {
        match &self.media_root {
            Some(root) => root.clone(),
            None => self
                .path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// Base location for media URLs.
    ///
    /// `TABLEMIRROR_BASE_URL` wins over the configured value, which wins
    /// over the local default.
    pub fn resolve_base_url(&self) -> String {
        pick_base_url(std::env::var(BASE_URL_ENV).ok(), self.base_url.as_deref())
    }
}

fn pick_base_url(env: Option<String>, configured: Option<&str>) -> String {
    let url = env
        .filter(|v| !v.trim().is_empty())
        .or_else(|| configured.filter(|v| !v.trim().is_empty()).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    url.trim().trim_end_matches('/').to_string()
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = MirrorConfig::default();
        assert_eq!(config.path, PathBuf::from("local.db"));
        assert_eq!(config.media_dir(), PathBuf::from("."));
        assert!(!config.replicate);
        assert!(config.create_if_missing);
    }

    #[test]
    fn test_builder() {
        let config = MirrorConfig::new("/data/mirror.db")
            .base_url("http://files.local/")
            .replicate(true)
            .create_if_missing(false);
        assert_eq!(config.media_dir(), PathBuf::from("/data"));
        assert_eq!(config.base_url.as_deref(), Some("http://files.local/"));
        assert!(config.replicate);
        assert!(!config.create_if_missing);

        let config = config.media_root("/srv/media");
        assert_eq!(config.media_dir(), PathBuf::from("/srv/media"));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (DB_ENV, "/tmp/m.db"),
            (MEDIA_ROOT_ENV, "/tmp/media"),
            (BASE_URL_ENV, "http://10.0.0.2:8000"),
            (REPLICATE_ENV, "Yes"),
        ]
        .into_iter()
        .collect();
        let config = MirrorConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.path, PathBuf::from("/tmp/m.db"));
        assert_eq!(config.media_dir(), PathBuf::from("/tmp/media"));
        assert_eq!(config.base_url.as_deref(), Some("http://10.0.0.2:8000"));
        assert!(config.replicate);

        let config = MirrorConfig::from_lookup(|_| None);
        assert_eq!(config, MirrorConfig::default());
    }

    #[test]
    fn test_base_url_precedence() {
        assert_eq!(
            pick_base_url(Some("http://env:1/".into()), Some("http://cfg:2")),
            "http://env:1"
        );
        assert_eq!(pick_base_url(Some("  ".into()), Some("http://cfg:2/")), "http://cfg:2");
        assert_eq!(pick_base_url(None, None), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_parse_flag() {
        for v in ["1", "true", "YES", "on"] {
            assert!(parse_flag(v));
        }
        for v in ["0", "false", "", "maybe"] {
            assert!(!parse_flag(v));
        }
    }
}
