//! Database API - high-level interface for the mirror.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::config::MirrorConfig;
use super::table::Table;
use crate::catalog::{KeyResolver, SchemaError, TableSchema};
use crate::media::{MediaError, MediaStore};
use crate::predicate::PredicateError;
use crate::remote::{RemoteBridge, RemoteError};
use crate::storage::{MirrorStore, SchemaChange, StorageError, TableName};

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("predicate error: {0}")]
    Predicate(#[from] PredicateError),

    #[error("media error: {0}")]
    Media(#[from] MediaError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("field '{field}' not found in {table}")]
    FieldNotFound { table: String, field: String },

    #[error("row {key} of {table} disappeared before it could be read back")]
    RowNotFound { table: String, key: String },

    #[error("no remote bridge configured")]
    NoRemote,

    #[error("database not found: {0}")]
    NotFound(PathBuf),
}

impl DatabaseError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        match self {
            DatabaseError::Storage(e) => e.is_not_found(),
            DatabaseError::Media(e) => e.is_not_found(),
            DatabaseError::Remote(e) => e.is_not_found(),
            DatabaseError::FieldNotFound { .. }
            | DatabaseError::RowNotFound { .. }
            | DatabaseError::NotFound(_) => true,
            _ => false,
        }
    }

    /// check if this error is a caller contract violation rather than a fault
    pub fn is_caller_error(&self) -> bool {
        match self {
            DatabaseError::Storage(e) => e.is_caller_error(),
            DatabaseError::Predicate(_)
            | DatabaseError::Schema(_)
            | DatabaseError::FieldNotFound { .. } => true,
            _ => false,
        }
    }
}

/// Everything a table handle or live row needs, shared by reference count.
#[derive(Clone)]
pub(crate) struct Context {
    pub(crate) store: Arc<MirrorStore>,
    pub(crate) media: Arc<MediaStore>,
    pub(crate) keys: Arc<KeyResolver>,
    pub(crate) remote: Option<Arc<dyn RemoteBridge>>,
    pub(crate) replicate: bool,
}

impl Context {
    /// The remote to propagate writes to, when replication is on.
    pub(crate) fn replica(&self) -> Option<&dyn RemoteBridge> {
        if self.replicate {
            self.remote.as_deref()
        } else {
            None
        }
    }
}

/// The main database handle.
pub struct Database {
    config: MirrorConfig,
    ctx: Context,
}

impl Database {
    /// Open or create a mirror at the given path.
    pub fn open(path: impl AsRef<Path>) -> DatabaseResult<Self> {
        Self::open_with_config(MirrorConfig::new(path.as_ref()))
    }

    /// Open or create a mirror with custom configuration.
    pub fn open_with_config(config: MirrorConfig) -> DatabaseResult<Self> {
        if !config.create_if_missing && !config.path.exists() {
            return Err(DatabaseError::NotFound(config.path.clone()));
        }
        let store = MirrorStore::open(&config.path)?;
        Self::assemble(config, store)
    }

    /// Create a mirror held in memory, with media files under `media_root`.
    pub fn open_in_memory(media_root: impl Into<PathBuf>) -> DatabaseResult<Self> {
        let config = MirrorConfig::new(":memory:").media_root(media_root);
        Self::assemble(config, MirrorStore::open_in_memory()?)
    }

    fn assemble(config: MirrorConfig, store: MirrorStore) -> DatabaseResult<Self> {
        let media_dir = config.media_dir();
        let media = MediaStore::open(&media_dir, config.resolve_base_url())?;
        info!(
            path = %config.path.display(),
            media_root = %media_dir.display(),
            base_url = media.base_url(),
            replicate = config.replicate,
            "opened mirror"
        );

        Ok(Self {
            ctx: Context {
                store: Arc::new(store),
                media: Arc::new(media),
                keys: Arc::new(KeyResolver::new()),
                remote: None,
                replicate: config.replicate,
            },
            config,
        })
    }

    /// Use the given key shapes for every table handle created afterwards.
    pub fn with_keys(mut self, keys: KeyResolver) -> Self {
        self.ctx.keys = Arc::new(keys);
        self
    }

    /// Attach the remote authority.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteBridge>) -> Self {
        self.ctx.remote = Some(remote);
        self
    }

    /// Turn write propagation to the remote on or off.
    pub fn with_replication(mut self, replicate: bool) -> Self {
        self.ctx.replicate = replicate;
        self.config.replicate = replicate;
        self
    }

    /// Get a handle on a table.
    ///
    /// The table does not have to exist yet; reads and writes against a
    /// table that was never synchronized fail with a not-found error.
    pub fn table(&self, name: &str) -> DatabaseResult<Table> {
        let name = TableName::new(name).map_err(StorageError::from)?;
        Ok(Table::new(name.into_string(), self.ctx.clone()))
    }

    /// Pull a table's column definitions from the remote and apply them.
    pub fn sync_schema(&self, table: &str) -> DatabaseResult<SchemaChange> {
        let remote = self.remote()?;
        let columns = remote.schema(table)?;
        let schema = TableSchema::new(table, columns).with_key(self.ctx.keys.resolve(table));
        self.apply_schema(&schema)
    }

    /// Apply a schema to the local mirror without asking the remote.
    ///
    /// The schema's own key shape is replaced by the resolver's, so key
    /// columns always match what table handles will look up by.
    pub fn apply_schema(&self, schema: &TableSchema) -> DatabaseResult<SchemaChange> {
        let schema = schema.clone().with_key(self.ctx.keys.resolve(&schema.name));
        Ok(self.ctx.store.sync_schema(&schema)?)
    }

    /// Synchronize several tables' schemas, stopping at the first failure.
    pub fn sync_all<I, S>(&self, tables: I) -> DatabaseResult<Vec<(String, SchemaChange)>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut changes = Vec::new();
        for table in tables {
            let table = table.as_ref();
            let change = self.sync_schema(table)?;
            changes.push((table.to_string(), change));
        }
        Ok(changes)
    }

    /// Copy remote rows whose key the mirror does not have yet.
    ///
    /// The schema is synchronized first. Rows already present locally are
    /// left alone, so pulling twice is a no-op. Returns the number of rows
    /// added.
    pub fn pull(&self, table: &str) -> DatabaseResult<usize> {
        let remote = self.remote()?;
        self.sync_schema(table)?;

        let shape = self.ctx.keys.resolve(table);
        let mut added = 0;
        for row in remote.fetch_all(table)? {
            let key = match shape.extract(&row) {
                Ok(key) => key,
                Err(e) => {
                    warn!(table, error = %e, "skipping remote row without a usable key");
                    continue;
                }
            };
            if self.ctx.store.get_by_key(table, &shape, &key)?.is_none() {
                self.ctx.store.insert(table, &shape, &row)?;
                added += 1;
            }
        }
        info!(table, rows = added, "pulled remote rows");
        Ok(added)
    }

    /// List all mirrored tables.
    pub fn tables(&self) -> DatabaseResult<Vec<String>> {
        Ok(self.ctx.store.list_tables()?)
    }

    /// Get the database path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Get the configuration.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// The media store backing this mirror.
    pub fn media(&self) -> &MediaStore {
        &self.ctx.media
    }

    /// The key shapes in use.
    pub fn keys(&self) -> &KeyResolver {
        &self.ctx.keys
    }

    fn remote(&self) -> DatabaseResult<Arc<dyn RemoteBridge>> {
        self.ctx.remote.clone().ok_or(DatabaseError::NoRemote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDef, DataType, KeyValue};
    use crate::remote::InMemoryRemote;
    use serde_json::json;
    use tempfile::TempDir;

    fn make_row(v: serde_json::Value) -> crate::storage::Record {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_open_database() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path().join("mirror.db")).unwrap();
        assert!(db.tables().unwrap().is_empty());
        assert!(dir.path().join("media_files").is_dir());
    }

    #[test]
    fn test_open_missing_without_create() {
        let dir = TempDir::new().unwrap();
        let config = MirrorConfig::new(dir.path().join("absent.db")).create_if_missing(false);
        let err = Database::open_with_config(config).err().unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_table_name() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory(dir.path()).unwrap();
        let err = db.table("bad name").err().unwrap();
        assert!(err.is_caller_error());
    }

    #[test]
    fn test_sync_schema_needs_remote() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory(dir.path()).unwrap();
        assert!(matches!(db.sync_schema("users"), Err(DatabaseError::NoRemote)));
    }

    #[test]
    fn test_sync_schema_from_remote() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(
            InMemoryRemote::new()
                .with_table("candidates", [("uid", "string"), ("score", "number"), ("resume", "media")]),
        );
        let db = Database::open_in_memory(dir.path())
            .unwrap()
            .with_keys(KeyResolver::new().single("candidates", "uid"))
            .with_remote(remote);

        let change = db.sync_schema("candidates").unwrap();
        assert!(change.created);
        assert!(db.sync_schema("candidates").unwrap().is_noop());

        let columns = db.table("candidates").unwrap().schema().unwrap();
        assert_eq!(
            columns,
            vec![
                ColumnDef::new("uid", DataType::Text),
                ColumnDef::new("score", DataType::Float),
                ColumnDef::new("resume", DataType::Media),
            ]
        );
    }

    #[test]
    fn test_sync_all_stops_at_failure() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(InMemoryRemote::new().with_table("a", [("name", "string")]));
        let db = Database::open_in_memory(dir.path()).unwrap().with_remote(remote);

        let err = db.sync_all(["a", "missing"]).unwrap_err();
        assert!(matches!(err, DatabaseError::Remote(RemoteError::TableNotFound(_))));
        assert_eq!(db.tables().unwrap(), vec!["a".to_string()]);

        let changes = db.sync_all(["a"]).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].1.is_noop());
    }

    #[test]
    fn test_pull_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(InMemoryRemote::new().with_rows(
            "projects",
            [
                make_row(json!({"uid": "p1", "title": "Alpha"})),
                make_row(json!({"uid": "p2", "title": "Beta"})),
            ],
        ));
        let db = Database::open_in_memory(dir.path())
            .unwrap()
            .with_keys(KeyResolver::new().single("projects", "uid"))
            .with_remote(remote);

        assert_eq!(db.pull("projects").unwrap(), 2);
        assert_eq!(db.pull("projects").unwrap(), 0);

        let projects = db.table("projects").unwrap();
        assert_eq!(projects.len().unwrap(), 2);
        let p2 = projects.get_by_key(KeyValue::from("p2")).unwrap().unwrap();
        assert_eq!(p2.raw("title").unwrap(), &json!("Beta"));
    }

    #[test]
    fn test_apply_schema_uses_resolver_key() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory(dir.path())
            .unwrap()
            .with_keys(KeyResolver::new().composite("org", ["proj_uid", "task"]));
        let schema = TableSchema::new("org", vec![ColumnDef::new("lead", DataType::Text)]);
        db.apply_schema(&schema).unwrap();

        let names: Vec<String> = db
            .table("org")
            .unwrap()
            .schema()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["lead", "proj_uid", "task"]);
    }
}
