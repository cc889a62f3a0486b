//! Live rows: a materialized record that writes through on every change.

use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use super::api::{Context, DatabaseError, DatabaseResult};
use crate::catalog::{KeyShape, KeyValue};
use crate::media::{Media, MediaStore, MediaUrl};
use crate::storage::{Record, StorageError, WriteOutcome};

/// A field as handed to the caller.
///
/// Media references come back resolved to a fetchable location.
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    Value(Value),
    Media(MediaUrl),
}

impl RowValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            RowValue::Value(v) => Some(v),
            RowValue::Media(_) => None,
        }
    }

    pub fn as_media(&self) -> Option<&MediaUrl> {
        match self {
            RowValue::Media(m) => Some(m),
            RowValue::Value(_) => None,
        }
    }

    /// Collapse into a plain value; media becomes its URL string.
    pub fn into_value(self) -> Value {
        match self {
            RowValue::Value(v) => v,
            RowValue::Media(m) => Value::String(m.url().to_string()),
        }
    }
}

/// One record of a table, kept in memory and flushed on every write.
///
/// A live row never re-reads the mirror. Two rows built from the same
/// record are independent copies and can drift apart; the last write to
/// reach the mirror wins.
#[derive(Clone)]
pub struct LiveRow {
    table: String,
    shape: KeyShape,
    record: Record,
    ctx: Context,
}

impl LiveRow {
    pub(crate) fn new(table: String, shape: KeyShape, record: Record, ctx: Context) -> Self {
        Self {
            table,
            shape,
            record,
            ctx,
        }
    }

    /// Name of the table this row belongs to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The row's key, if the record carries a complete one.
    pub fn key(&self) -> Option<KeyValue> {
        self.shape.extract(&self.record).ok()
    }

    /// Read a field, resolving media references to URLs.
    pub fn get(&self, field: &str) -> DatabaseResult<RowValue> {
        match self.raw(field)? {
            Value::String(s) if MediaStore::is_reference(s) => {
                Ok(RowValue::Media(self.ctx.media.resolve(s)?))
            }
            other => Ok(RowValue::Value(other.clone())),
        }
    }

    /// Read a field exactly as decoded from the mirror.
    pub fn raw(&self, field: &str) -> DatabaseResult<&Value> {
        self.record.get(field).ok_or_else(|| self.field_not_found(field))
    }

    /// Set a field and flush it.
    ///
    /// Only the changed column is written locally. With replication on, the
    /// full record is then sent to the remote under the key the row had
    /// before the write. A remote failure is reported but the local write
    /// stays.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> DatabaseResult<WriteOutcome> {
        if !self.record.contains_key(field) {
            return Err(self.field_not_found(field));
        }
        let key = self.current_key()?;
        let value = value.into();

        let mut changed = Record::new();
        changed.insert(field.to_string(), value.clone());
        let outcome = self.ctx.store.update(&self.table, &self.shape, &key, &changed)?;
        self.record.insert(field.to_string(), value);

        if !outcome.is_applied() {
            return Ok(outcome);
        }
        if let Some(remote) = self.ctx.replica() {
            if let Err(e) = remote.update(&self.table, &key, &self.record) {
                warn!(table = %self.table, key = %key, field, error = %e, "remote update failed");
                return Err(e.into());
            }
            debug!(table = %self.table, key = %key, field, "replicated update");
        }
        Ok(outcome)
    }

    /// Store a payload and point `field` at it.
    pub fn set_media(&mut self, field: &str, media: &Media) -> DatabaseResult<WriteOutcome> {
        if !self.record.contains_key(field) {
            return Err(self.field_not_found(field));
        }
        let identity = self.current_key()?.to_identity();
        let reference = self.ctx.media.save(&self.table, field, &identity, media)?;
        self.set(field, reference)
    }

    /// Delete the row from the mirror, and from the remote when replicating.
    ///
    /// Returns the number of local rows removed; zero when the row was
    /// already gone.
    pub fn delete(self) -> DatabaseResult<usize> {
        let key = self.current_key()?;
        let removed = self.ctx.store.delete(&self.table, &self.shape, &key)?;

        if let Some(remote) = self.ctx.replica() {
            if let Err(e) = remote.delete(&self.table, &key) {
                warn!(table = %self.table, key = %key, error = %e, "remote delete failed");
                return Err(e.into());
            }
        }
        Ok(removed)
    }

    /// Field names.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.record.keys()
    }

    /// Field names and raw values.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.record.iter()
    }

    pub fn len(&self) -> usize {
        self.record.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    /// Copy of the raw record.
    pub fn to_map(&self) -> Record {
        self.record.clone()
    }

    fn current_key(&self) -> DatabaseResult<KeyValue> {
        self.shape
            .extract(&self.record)
            .map_err(|e| DatabaseError::from(StorageError::invalid_key(&self.table, e)))
    }

    fn field_not_found(&self, field: &str) -> DatabaseError {
        DatabaseError::FieldNotFound {
            table: self.table.clone(),
            field: field.to_string(),
        }
    }
}

impl fmt::Debug for LiveRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveRow")
            .field("table", &self.table)
            .field("key", &self.shape)
            .field("record", &self.record)
            .finish()
    }
}

impl fmt::Display for LiveRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LiveRow({}, {})", self.table, Value::Object(self.record.clone()))
    }
}
