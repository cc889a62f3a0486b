//! The local mirror: one SQLite table per remote table.
//!
//! Every operation takes the connection lock for its whole duration, runs
//! synchronously and returns decoded records. Writes are row-at-a-time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Statement};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::{StorageError, StorageResult};
use super::types::{quote, validate_identifier, Record, SchemaChange, TableName, WriteOutcome};
use crate::catalog::{ColumnDef, DataType, KeyError, KeyShape, KeyValue, TableSchema};
use crate::codec::{self, StoredValue};

/// How long a statement waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The local persistent table store.
pub struct MirrorStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl MirrorStore {
    /// Open (or create) a mirror database file.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Open a throwaway in-memory mirror.
    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        })
    }

    /// Path of the database file, if not in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if a table exists in the mirror.
    pub fn table_exists(&self, table: &str) -> StorageResult<bool> {
        let table = TableName::new(table)?;
        let conn = self.conn.lock();
        exists(&conn, &table)
    }

    /// List all mirrored tables.
    pub fn list_tables(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Columns of a mirrored table, in declaration order.
    pub fn columns(&self, table: &str) -> StorageResult<Vec<ColumnDef>> {
        let table = TableName::new(table)?;
        let conn = self.conn.lock();
        existing_columns(&conn, &table)
    }

    /// Reconcile the local table with a remote schema.
    ///
    /// Creates the table when missing and appends any missing columns
    /// otherwise. Existing columns are never dropped or retyped, and an
    /// unchanged schema is a no-op.
    pub fn sync_schema(&self, schema: &TableSchema) -> StorageResult<SchemaChange> {
        schema.validate()?;
        let table = TableName::new(schema.name.as_str())?;
        let schema = schema.clone().with_key_columns();
        for col in &schema.columns {
            validate_identifier(&col.name)?;
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let existing = existing_columns(&tx, &table)?;
        let mut change = SchemaChange::default();

        if existing.is_empty() {
            let columns: Vec<String> = schema
                .columns
                .iter()
                .map(|c| format!("{} {}", quote(&c.name), c.data_type.sql_name()))
                .collect();
            tx.execute(
                &format!("CREATE TABLE {} ({})", table.quoted(), columns.join(", ")),
                [],
            )?;
            change.created = true;
            info!(table = %table, columns = ?schema.column_names(), "created mirror table");
        } else {
            for col in schema.missing_from(&existing) {
                tx.execute(
                    &format!(
                        "ALTER TABLE {} ADD COLUMN {} {}",
                        table.quoted(),
                        quote(&col.name),
                        col.data_type.sql_name()
                    ),
                    [],
                )?;
                change.added_columns.push(col.name.clone());
                info!(table = %table, column = %col.name, data_type = %col.data_type, "added mirror column");
            }
        }

        tx.commit()?;
        Ok(change)
    }

    /// Full scan of a table in insertion order, decoded.
    pub fn fetch_all(&self, table: &str) -> StorageResult<Vec<Record>> {
        let table = TableName::new(table)?;
        let conn = self.conn.lock();
        require_table(&conn, &table)?;

        let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY rowid", table.quoted()))?;
        read_records(&mut stmt, Vec::new())
    }

    /// Number of rows in a table.
    pub fn count(&self, table: &str) -> StorageResult<usize> {
        let table = TableName::new(table)?;
        let conn = self.conn.lock();
        require_table(&conn, &table)?;

        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.quoted()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Insert a record and return its key.
    ///
    /// A single key that the record leaves out (or sets to null) is
    /// generated: the next free integer for numeric key columns, a ULID
    /// otherwise. Composite keys must be supplied in full.
    pub fn insert(&self, table: &str, key: &KeyShape, record: &Record) -> StorageResult<KeyValue> {
        let table = TableName::new(table)?;
        let mut conn = self.conn.lock();
        let columns = require_table(&conn, &table)?;
        check_columns(&table, &columns, record.keys())?;

        let tx = conn.transaction()?;
        let mut record = record.clone();
        if let KeyShape::Single(field) = key {
            if record.get(field).map_or(true, Value::is_null) {
                let numeric = matches!(
                    column_type(&columns, field),
                    Some(DataType::Integer | DataType::Float)
                );
                let id = if numeric {
                    Value::from(next_free_id(&tx, &table, key, field)?)
                } else {
                    Value::String(ulid::Ulid::new().to_string().to_lowercase())
                };
                record.insert(field.clone(), id);
            }
        }
        let key_value = key
            .extract(&record)
            .map_err(|e| StorageError::invalid_key(table.as_str(), e))?;
        if find_rowid(&tx, &table, key, &key_value)?.is_some() {
            return Err(StorageError::DuplicateKey {
                table: table.to_string(),
                key: key_value.to_string(),
            });
        }

        warn_type_mismatches(&table, &columns, &record);
        let encoded = codec::encode_record(&record);
        let sql = if encoded.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table.quoted())
        } else {
            let names: Vec<String> = encoded.iter().map(|(k, _)| quote(k)).collect();
            let placeholders: Vec<String> = (1..=encoded.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table.quoted(),
                names.join(", "),
                placeholders.join(", ")
            )
        };
        tx.execute(&sql, params_from_iter(encoded.iter().map(|(_, v)| v)))?;
        tx.commit()?;

        debug!(table = %table, key = %key_value, "inserted row");
        Ok(key_value)
    }

    /// Update the given columns of the row matching `key`.
    ///
    /// Columns not named in `fields` are left untouched. A key that matches
    /// no row yields [`WriteOutcome::NotFound`].
    pub fn update(
        &self,
        table: &str,
        key: &KeyShape,
        key_value: &KeyValue,
        fields: &Record,
    ) -> StorageResult<WriteOutcome> {
        let table = TableName::new(table)?;
        let components = key
            .components(key_value)
            .map_err(|e| StorageError::invalid_key(table.as_str(), e))?;

        let conn = self.conn.lock();
        let columns = require_table(&conn, &table)?;
        check_columns(&table, &columns, fields.keys())?;

        if fields.is_empty() {
            let found = find_rowid(&conn, &table, key, key_value)?.is_some();
            return Ok(if found { WriteOutcome::Applied(0) } else { WriteOutcome::NotFound });
        }

        if let Some(new_key) = rekey(&table, key, &components, fields)? {
            let current = find_rowid(&conn, &table, key, key_value)?;
            if let Some(other) = find_rowid(&conn, &table, key, &new_key)? {
                if current != Some(other) {
                    return Err(StorageError::DuplicateKey {
                        table: table.to_string(),
                        key: new_key.to_string(),
                    });
                }
            }
        }

        warn_type_mismatches(&table, &columns, fields);
        let encoded = codec::encode_record(fields);
        let assignments: Vec<String> = encoded
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{} = ?{}", quote(name), i + 1))
            .collect();
        let where_clause = key_clause(key, encoded.len() + 1);
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            table.quoted(),
            assignments.join(", "),
            where_clause
        );

        let params: Vec<StoredValue> = encoded
            .into_iter()
            .map(|(_, v)| v)
            .chain(components.iter().map(codec::encode))
            .collect();
        let count = conn.execute(&sql, params_from_iter(params.iter()))?;

        let outcome = WriteOutcome::from_count(count);
        match outcome {
            WriteOutcome::Applied(n) => {
                debug!(table = %table, key = %key_value, rows = n, fields = ?fields.keys().collect::<Vec<_>>(), "updated row")
            }
            WriteOutcome::NotFound => warn!(table = %table, key = %key_value, "update matched no row"),
        }
        Ok(outcome)
    }

    /// Delete the rows matching `key`. Deleting an absent key is not an error.
    pub fn delete(&self, table: &str, key: &KeyShape, key_value: &KeyValue) -> StorageResult<usize> {
        let table = TableName::new(table)?;
        let components = key
            .components(key_value)
            .map_err(|e| StorageError::invalid_key(table.as_str(), e))?;

        let conn = self.conn.lock();
        require_table(&conn, &table)?;

        let sql = format!("DELETE FROM {} WHERE {}", table.quoted(), key_clause(key, 1));
        let params: Vec<StoredValue> = components.iter().map(codec::encode).collect();
        let count = conn.execute(&sql, params_from_iter(params.iter()))?;

        debug!(table = %table, key = %key_value, rows = count, "deleted row");
        Ok(count)
    }

    /// Look a row up by key.
    pub fn get_by_key(
        &self,
        table: &str,
        key: &KeyShape,
        key_value: &KeyValue,
    ) -> StorageResult<Option<Record>> {
        let table = TableName::new(table)?;
        let components = key
            .components(key_value)
            .map_err(|e| StorageError::invalid_key(table.as_str(), e))?;

        let conn = self.conn.lock();
        require_table(&conn, &table)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} WHERE {} ORDER BY rowid LIMIT 1",
            table.quoted(),
            key_clause(key, 1)
        ))?;
        let params = components.iter().map(codec::encode).collect();
        Ok(read_records(&mut stmt, params)?.into_iter().next())
    }
}

fn exists(conn: &Connection, table: &TableName) -> StorageResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn existing_columns(conn: &Connection, table: &TableName) -> StorageResult<Vec<ColumnDef>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table.quoted()))?;
    let columns = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let decl: String = row.get(2)?;
            Ok(ColumnDef::new(name, DataType::from_declared(&decl)))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Columns of a table that must already exist.
fn require_table(conn: &Connection, table: &TableName) -> StorageResult<Vec<ColumnDef>> {
    let columns = existing_columns(conn, table)?;
    if columns.is_empty() {
        return Err(StorageError::TableNotFound(table.to_string()));
    }
    Ok(columns)
}

fn column_type(columns: &[ColumnDef], name: &str) -> Option<DataType> {
    columns.iter().find(|c| c.name == name).map(|c| c.data_type)
}

fn check_columns<'a>(
    table: &TableName,
    columns: &[ColumnDef],
    names: impl Iterator<Item = &'a String>,
) -> StorageResult<()> {
    let known: HashSet<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    for name in names {
        if !known.contains(name.as_str()) {
            return Err(StorageError::UnknownColumn {
                table: table.to_string(),
                column: name.clone(),
            });
        }
    }
    Ok(())
}

fn warn_type_mismatches(table: &TableName, columns: &[ColumnDef], record: &Record) {
    for (name, value) in record {
        if let Some(data_type) = column_type(columns, name) {
            if !data_type.matches(value) {
                warn!(table = %table, column = %name, expected = %data_type, "value does not match column type");
            }
        }
    }
}

/// `"a" = ?n AND "b" = ?n+1 ...` over the key fields.
fn key_clause(key: &KeyShape, first_param: usize) -> String {
    key.fields()
        .iter()
        .enumerate()
        .map(|(i, field)| format!("{} = ?{}", quote(field), first_param + i))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn find_rowid(
    conn: &Connection,
    table: &TableName,
    key: &KeyShape,
    key_value: &KeyValue,
) -> StorageResult<Option<i64>> {
    let components = key
        .components(key_value)
        .map_err(|e: KeyError| StorageError::invalid_key(table.as_str(), e))?;
    let params: Vec<StoredValue> = components.iter().map(codec::encode).collect();
    let rowid = conn
        .query_row(
            &format!("SELECT rowid FROM {} WHERE {} LIMIT 1", table.quoted(), key_clause(key, 1)),
            params_from_iter(params.iter()),
            |row| row.get(0),
        )
        .optional()?;
    Ok(rowid)
}

/// Smallest integer above every rowid and every integer already in `field`
/// that no row uses as its key.
fn next_free_id(conn: &Connection, table: &TableName, key: &KeyShape, field: &str) -> StorageResult<i64> {
    let column = quote(field);
    let mut next: i64 = conn.query_row(
        &format!(
            "SELECT MAX(COALESCE((SELECT MAX(rowid) FROM {t}), 0), \
             COALESCE((SELECT MAX({c}) FROM {t} WHERE typeof({c}) = 'integer'), 0)) + 1",
            t = table.quoted(),
            c = column
        ),
        [],
        |row| row.get(0),
    )?;
    while find_rowid(conn, table, key, &KeyValue::Single(Value::from(next)))?.is_some() {
        next += 1;
    }
    Ok(next)
}

/// The key a row ends up with after `fields` is written, when the write
/// touches any key field.
fn rekey(
    table: &TableName,
    key: &KeyShape,
    components: &[Value],
    fields: &Record,
) -> StorageResult<Option<KeyValue>> {
    if !key.fields().iter().any(|f| fields.contains_key(*f)) {
        return Ok(None);
    }
    let mut merged = Record::new();
    for (field, current) in key.fields().into_iter().zip(components) {
        let value = fields.get(field).unwrap_or(current);
        merged.insert(field.to_string(), value.clone());
    }
    key.extract(&merged)
        .map(Some)
        .map_err(|e| StorageError::invalid_key(table.as_str(), e))
}

fn read_records(stmt: &mut Statement<'_>, params: Vec<StoredValue>) -> StorageResult<Vec<Record>> {
    let columns: Vec<(String, Option<DataType>)> = stmt
        .columns()
        .iter()
        .map(|c| (c.name().to_string(), c.decl_type().map(DataType::from_declared)))
        .collect();

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Record::new();
        for (i, (name, hint)) in columns.iter().enumerate() {
            let stored: StoredValue = row.get(i)?;
            record.insert(name.clone(), codec::decode_as(&stored, *hint));
        }
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchemaBuilder;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(v: Value) -> Record {
        v.as_object().unwrap().clone()
    }

    fn scores_schema() -> TableSchema {
        SchemaBuilder::new("scores")
            .add_column("uid", DataType::Text)
            .add_column("score", DataType::Integer)
            .key(KeyShape::Single("uid".into()))
            .build()
            .unwrap()
    }

    fn composite_key() -> KeyShape {
        KeyShape::Composite(vec!["a".into(), "b".into()])
    }

    fn composite_store() -> MirrorStore {
        let store = MirrorStore::open_in_memory().unwrap();
        let schema = SchemaBuilder::new("pairs")
            .add_column("a", DataType::Integer)
            .add_column("b", DataType::Text)
            .add_column("note", DataType::Text)
            .key(composite_key())
            .build()
            .unwrap();
        store.sync_schema(&schema).unwrap();
        store
    }

    #[test]
    fn test_sync_schema_creates_then_noop() {
        let store = MirrorStore::open_in_memory().unwrap();
        let change = store.sync_schema(&scores_schema()).unwrap();
        assert!(change.created);

        let cols = store.columns("scores").unwrap();
        assert_eq!(cols[0], ColumnDef::new("uid", DataType::Text));
        assert_eq!(cols[1], ColumnDef::new("score", DataType::Integer));

        let again = store.sync_schema(&scores_schema()).unwrap();
        assert!(again.is_noop());
    }

    #[test]
    fn test_sync_schema_is_additive() {
        let store = MirrorStore::open_in_memory().unwrap();
        store.sync_schema(&scores_schema()).unwrap();
        store
            .insert("scores", &KeyShape::Single("uid".into()), &record(json!({"uid": "u1", "score": 5})))
            .unwrap();

        let mut wider = scores_schema();
        wider.add_column(ColumnDef::new("meta", DataType::Json)).unwrap();
        let change = store.sync_schema(&wider).unwrap();
        assert_eq!(change.added_columns, vec!["meta".to_string()]);

        // A narrower schema never drops anything.
        let narrow = SchemaBuilder::new("scores")
            .add_column("uid", DataType::Text)
            .key(KeyShape::Single("uid".into()))
            .build()
            .unwrap();
        assert!(store.sync_schema(&narrow).unwrap().is_noop());
        assert_eq!(store.columns("scores").unwrap().len(), 3);

        let rows = store.fetch_all("scores").unwrap();
        assert_eq!(rows[0]["score"], json!(5));
        assert_eq!(rows[0]["meta"], Value::Null);
    }

    #[test]
    fn test_sync_schema_rejects_bad_names() {
        let store = MirrorStore::open_in_memory().unwrap();
        let schema = TableSchema::new("bad name", vec![ColumnDef::new("x", DataType::Text)]);
        assert!(matches!(store.sync_schema(&schema), Err(StorageError::InvalidName(_))));

        let schema = TableSchema::new("ok", vec![ColumnDef::new("x\"; --", DataType::Text)]);
        assert!(matches!(store.sync_schema(&schema), Err(StorageError::InvalidName(_))));
    }

    #[test]
    fn test_fetch_all_unknown_table() {
        let store = MirrorStore::open_in_memory().unwrap();
        assert!(matches!(store.fetch_all("ghost"), Err(StorageError::TableNotFound(_))));
    }

    #[test]
    fn test_generated_integer_identity() {
        let store = MirrorStore::open_in_memory().unwrap();
        let schema = TableSchema::new("notes", vec![ColumnDef::new("body", DataType::Text)]);
        store.sync_schema(&schema).unwrap();

        let key = KeyShape::Single("id".into());
        let first = store.insert("notes", &key, &record(json!({"body": "a"}))).unwrap();
        let second = store.insert("notes", &key, &record(json!({"body": "b"}))).unwrap();
        assert_eq!(first, KeyValue::from(json!(1)));
        assert_eq!(second, KeyValue::from(json!(2)));

        let row = store.get_by_key("notes", &key, &second).unwrap().unwrap();
        assert_eq!(row["body"], json!("b"));
        assert_eq!(row["id"], json!(2));
    }

    #[test]
    fn test_generated_id_skips_explicit_ids() {
        let store = MirrorStore::open_in_memory().unwrap();
        let schema = TableSchema::new("notes", vec![ColumnDef::new("body", DataType::Text)]);
        store.sync_schema(&schema).unwrap();

        let key = KeyShape::Single("id".into());
        store.insert("notes", &key, &record(json!({"id": 2, "body": "explicit"}))).unwrap();
        let generated = store.insert("notes", &key, &record(json!({"body": "generated"}))).unwrap();
        assert_eq!(generated, KeyValue::from(3i64));

        let row = store.get_by_key("notes", &key, &generated).unwrap().unwrap();
        assert_eq!(row["body"], json!("generated"));
        let explicit = store.get_by_key("notes", &key, &KeyValue::from(2i64)).unwrap().unwrap();
        assert_eq!(explicit["body"], json!("explicit"));
    }

    #[test]
    fn test_generated_text_identity() {
        let store = MirrorStore::open_in_memory().unwrap();
        store.sync_schema(&scores_schema()).unwrap();

        let key = KeyShape::Single("uid".into());
        let generated = store.insert("scores", &key, &record(json!({"score": 1}))).unwrap();
        match &generated {
            KeyValue::Single(Value::String(s)) => assert_eq!(s.len(), 26),
            other => panic!("expected generated ulid, got {other:?}"),
        }
        assert!(store.get_by_key("scores", &key, &generated).unwrap().is_some());
    }

    #[test]
    fn test_composite_key_round_trip() {
        let store = composite_store();
        let inserted = store
            .insert("pairs", &composite_key(), &record(json!({"a": 1, "b": "x", "note": "hi"})))
            .unwrap();
        assert_eq!(inserted, KeyValue::tuple([json!(1), json!("x")]));

        let row = store
            .get_by_key("pairs", &composite_key(), &KeyValue::tuple([json!(1), json!("x")]))
            .unwrap()
            .unwrap();
        assert_eq!(row, record(json!({"a": 1, "b": "x", "note": "hi"})));
    }

    #[test]
    fn test_bad_arity_fails_fast() {
        let store = composite_store();
        let short = KeyValue::tuple([json!(1)]);

        assert!(matches!(
            store.get_by_key("pairs", &composite_key(), &short),
            Err(StorageError::InvalidKey { .. })
        ));
        assert!(matches!(
            store.update("pairs", &composite_key(), &short, &record(json!({"note": "x"}))),
            Err(StorageError::InvalidKey { .. })
        ));
        assert!(matches!(
            store.delete("pairs", &composite_key(), &short),
            Err(StorageError::InvalidKey { .. })
        ));
        // Arity is checked before storage: even an unknown table reports the key.
        assert!(matches!(
            store.delete("ghost", &composite_key(), &short),
            Err(StorageError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_composite_insert_requires_all_fields() {
        let store = composite_store();
        let err = store
            .insert("pairs", &composite_key(), &record(json!({"a": 1, "note": "x"})))
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let store = composite_store();
        let row = record(json!({"a": 1, "b": "x"}));
        store.insert("pairs", &composite_key(), &row).unwrap();
        assert!(matches!(
            store.insert("pairs", &composite_key(), &row),
            Err(StorageError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_update_only_touches_named_columns() {
        let store = MirrorStore::open_in_memory().unwrap();
        let schema = SchemaBuilder::new("users")
            .add_column("email", DataType::Text)
            .add_column("name", DataType::Text)
            .add_column("prefs", DataType::Json)
            .add_column("active", DataType::Boolean)
            .key(KeyShape::Single("uid".into()))
            .build()
            .unwrap();
        store.sync_schema(&schema).unwrap();
        let key = KeyShape::Single("uid".into());
        store
            .insert(
                "users",
                &key,
                &record(json!({
                    "uid": "u1",
                    "email": "old@example.com",
                    "name": "Ada",
                    "prefs": {"theme": "dark", "tags": [1, 2]},
                    "active": true
                })),
            )
            .unwrap();
        let before = store.get_by_key("users", &key, &"u1".into()).unwrap().unwrap();

        let outcome = store
            .update("users", &key, &"u1".into(), &record(json!({"email": "new@example.com"})))
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Applied(1));

        let after = store.get_by_key("users", &key, &"u1".into()).unwrap().unwrap();
        assert_eq!(after["email"], json!("new@example.com"));
        for field in ["uid", "name", "prefs", "active"] {
            assert_eq!(after[field], before[field], "{field} changed");
        }
        assert_eq!(after["active"], json!(true));
    }

    #[test]
    fn test_update_rejects_null_key() {
        let store = MirrorStore::open_in_memory().unwrap();
        store.sync_schema(&scores_schema()).unwrap();
        let key = KeyShape::Single("uid".into());
        store.insert("scores", &key, &record(json!({"uid": "u1", "score": 1}))).unwrap();

        let err = store
            .update("scores", &key, &"u1".into(), &record(json!({"uid": null})))
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::InvalidKey { source: KeyError::NullComponent(ref f), .. } if f == "uid"
        ));
        assert!(store.get_by_key("scores", &key, &"u1".into()).unwrap().is_some());
    }

    #[test]
    fn test_update_rejects_key_collision() {
        let store = composite_store();
        let key = composite_key();
        store.insert("pairs", &key, &record(json!({"a": 1, "b": "x"}))).unwrap();
        store.insert("pairs", &key, &record(json!({"a": 1, "b": "y"}))).unwrap();

        let err = store
            .update("pairs", &key, &KeyValue::tuple([json!(1), json!("y")]), &record(json!({"b": "x"})))
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey { .. }));
        assert_eq!(store.count("pairs").unwrap(), 2);

        // rewriting a key field to its current value is not a collision
        let outcome = store
            .update(
                "pairs",
                &key,
                &KeyValue::tuple([json!(1), json!("y")]),
                &record(json!({"b": "y", "note": "same"})),
            )
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Applied(1));

        let moved = store
            .update("pairs", &key, &KeyValue::tuple([json!(1), json!("y")]), &record(json!({"a": 2})))
            .unwrap();
        assert_eq!(moved, WriteOutcome::Applied(1));
        assert!(store
            .get_by_key("pairs", &key, &KeyValue::tuple([json!(2), json!("y")]))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_mismatched_values_are_not_coerced() {
        let store = MirrorStore::open_in_memory().unwrap();
        let schema = SchemaBuilder::new("mixed")
            .add_column("uid", DataType::Text)
            .add_column("n", DataType::Integer)
            .add_column("f", DataType::Float)
            .add_column("t", DataType::Text)
            .key(KeyShape::Single("uid".into()))
            .build()
            .unwrap();
        store.sync_schema(&schema).unwrap();

        let row = record(json!({"uid": "u1", "n": 5.0, "f": "007", "t": 12}));
        store.insert("mixed", &KeyShape::Single("uid".into()), &row).unwrap();
        assert_eq!(store.fetch_all("mixed").unwrap(), vec![row]);
    }

    #[test]
    fn test_update_missing_row_is_not_found() {
        let store = MirrorStore::open_in_memory().unwrap();
        store.sync_schema(&scores_schema()).unwrap();
        let outcome = store
            .update("scores", &KeyShape::Single("uid".into()), &"nobody".into(), &record(json!({"score": 1})))
            .unwrap();
        assert_eq!(outcome, WriteOutcome::NotFound);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let store = MirrorStore::open_in_memory().unwrap();
        store.sync_schema(&scores_schema()).unwrap();
        let key = KeyShape::Single("uid".into());
        assert!(matches!(
            store.insert("scores", &key, &record(json!({"uid": "u1", "bogus": 1}))),
            Err(StorageError::UnknownColumn { .. })
        ));
        assert_eq!(store.count("scores").unwrap(), 0);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = composite_store();
        let key = composite_key();
        store.insert("pairs", &key, &record(json!({"a": 1, "b": "x"}))).unwrap();
        store.insert("pairs", &key, &record(json!({"a": 2, "b": "y"}))).unwrap();

        let target = KeyValue::tuple([json!(1), json!("x")]);
        assert_eq!(store.delete("pairs", &key, &target).unwrap(), 1);
        assert_eq!(store.delete("pairs", &key, &target).unwrap(), 0);

        let rows = store.fetch_all("pairs").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["b"], json!("y"));
    }

    #[test]
    fn test_fetch_all_keeps_insertion_order() {
        let store = MirrorStore::open_in_memory().unwrap();
        store.sync_schema(&scores_schema()).unwrap();
        let key = KeyShape::Single("uid".into());
        for uid in ["c", "a", "b"] {
            store.insert("scores", &key, &record(json!({"uid": uid, "score": 0}))).unwrap();
        }
        let uids: Vec<Value> = store
            .fetch_all("scores")
            .unwrap()
            .into_iter()
            .map(|r| r["uid"].clone())
            .collect();
        assert_eq!(uids, vec![json!("c"), json!("a"), json!("b")]);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mirror").join("local.db");
        {
            let store = MirrorStore::open(&path).unwrap();
            store.sync_schema(&scores_schema()).unwrap();
            store
                .insert("scores", &KeyShape::Single("uid".into()), &record(json!({"uid": "u1", "score": 3})))
                .unwrap();
        }
        let store = MirrorStore::open(&path).unwrap();
        assert_eq!(store.list_tables().unwrap(), vec!["scores".to_string()]);
        assert_eq!(store.fetch_all("scores").unwrap()[0]["score"], json!(3));
    }
}
