//! An in-process stand-in for the remote authority.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use super::error::{RemoteError, RemoteResult};
use super::RemoteBridge;
use crate::catalog::{ColumnDef, DataType, KeyResolver, KeyShape, KeyValue};
use crate::predicate::values_equal;
use crate::storage::Record;

/// A call the bridge accepted, in the order it arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    FetchAll { table: String },
    Insert { table: String, fields: Record },
    Update { table: String, key: KeyValue, fields: Record },
    Delete { table: String, key: KeyValue },
    Schema { table: String },
}

#[derive(Debug, Default)]
struct RemoteTable {
    columns: Option<Vec<ColumnDef>>,
    rows: Vec<Record>,
    last_id: i64,
}

/// Remote authority held in memory.
///
/// Tables must be declared with [`InMemoryRemote::with_table`] before use.
/// Flip [`InMemoryRemote::set_failing`] to make every call fail with
/// [`RemoteError::Unavailable`].
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    keys: KeyResolver,
    tables: Mutex<HashMap<String, RemoteTable>>,
    calls: Mutex<Vec<RemoteCall>>,
    failing: AtomicBool,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given key shapes for lookups.
    pub fn with_keys(mut self, keys: KeyResolver) -> Self {
        self.keys = keys;
        self
    }

    /// Declare a table with `(column, remote type name)` pairs.
    pub fn with_table<'a>(self, table: &str, columns: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let columns = columns
            .into_iter()
            .map(|(name, type_name)| ColumnDef::from_remote(name, type_name))
            .collect();
        self.tables.lock().entry(table.to_string()).or_default().columns = Some(columns);
        self
    }

    /// Seed rows into a table, declaring it if needed.
    ///
    /// A table declared only through its rows reports a schema inferred
    /// from the values.
    pub fn with_rows(self, table: &str, rows: impl IntoIterator<Item = Record>) -> Self {
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .rows
            .extend(rows);
        self
    }

    /// Make every subsequent call fail, or stop doing so.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls accepted so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Current rows of a table, empty when unknown.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.tables
            .lock()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    fn admit(&self, call: RemoteCall) -> RemoteResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("remote is marked as failing".into()));
        }
        self.calls.lock().push(call);
        Ok(())
    }

    fn position(&self, table: &RemoteTable, shape: &KeyShape, key: &KeyValue) -> RemoteResult<Option<usize>> {
        let components = shape
            .components(key)
            .map_err(|e| RemoteError::Rejected(e.to_string()))?;
        let fields = shape.fields();
        Ok(table.rows.iter().position(|row| {
            fields
                .iter()
                .zip(&components)
                .all(|(field, value)| row.get(*field).is_some_and(|v| values_equal(v, value)))
        }))
    }
}

impl RemoteBridge for InMemoryRemote {
    fn fetch_all(&self, table: &str) -> RemoteResult<Vec<Record>> {
        self.admit(RemoteCall::FetchAll { table: table.to_string() })?;
        let tables = self.tables.lock();
        let t = tables
            .get(table)
            .ok_or_else(|| RemoteError::TableNotFound(table.to_string()))?;
        Ok(t.rows.clone())
    }

    fn insert(&self, table: &str, fields: &Record) -> RemoteResult<KeyValue> {
        self.admit(RemoteCall::Insert {
            table: table.to_string(),
            fields: fields.clone(),
        })?;
        let shape = self.keys.resolve(table);
        let mut tables = self.tables.lock();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| RemoteError::TableNotFound(table.to_string()))?;

        let mut row = fields.clone();
        if let KeyShape::Single(field) = &shape {
            if row.get(field).map_or(true, Value::is_null) {
                t.last_id += 1;
                row.insert(field.clone(), Value::from(t.last_id));
            }
        }
        let key = shape
            .extract(&row)
            .map_err(|e| RemoteError::Rejected(e.to_string()))?;
        if self.position(t, &shape, &key)?.is_some() {
            return Err(RemoteError::Rejected(format!("duplicate key {} in {}", key, table)));
        }
        t.rows.push(row);
        Ok(key)
    }

    fn update(&self, table: &str, key: &KeyValue, fields: &Record) -> RemoteResult<()> {
        self.admit(RemoteCall::Update {
            table: table.to_string(),
            key: key.clone(),
            fields: fields.clone(),
        })?;
        let shape = self.keys.resolve(table);
        let mut tables = self.tables.lock();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| RemoteError::TableNotFound(table.to_string()))?;

        let idx = self.position(t, &shape, key)?.ok_or_else(|| RemoteError::RowNotFound {
            table: table.to_string(),
            key: key.to_string(),
        })?;
        for (name, value) in fields {
            t.rows[idx].insert(name.clone(), value.clone());
        }
        Ok(())
    }

    fn delete(&self, table: &str, key: &KeyValue) -> RemoteResult<()> {
        self.admit(RemoteCall::Delete {
            table: table.to_string(),
            key: key.clone(),
        })?;
        let shape = self.keys.resolve(table);
        let mut tables = self.tables.lock();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| RemoteError::TableNotFound(table.to_string()))?;

        if let Some(idx) = self.position(t, &shape, key)? {
            t.rows.remove(idx);
        }
        Ok(())
    }

    fn schema(&self, table: &str) -> RemoteResult<Vec<ColumnDef>> {
        self.admit(RemoteCall::Schema { table: table.to_string() })?;
        let tables = self.tables.lock();
        let t = tables
            .get(table)
            .ok_or_else(|| RemoteError::TableNotFound(table.to_string()))?;

        if let Some(columns) = &t.columns {
            return Ok(columns.clone());
        }
        let mut columns: Vec<ColumnDef> = Vec::new();
        for row in &t.rows {
            for (name, value) in row {
                let known = columns.iter().position(|c| &c.name == name);
                match known {
                    // a null sample says nothing; let a later row decide
                    Some(i) if columns[i].data_type == DataType::Text && !value.is_null() => {
                        columns[i].data_type = DataType::infer(value);
                    }
                    Some(_) => {}
                    None => columns.push(ColumnDef::new(name.clone(), DataType::infer(value))),
                }
            }
        }
        Ok(columns)
    }
}
