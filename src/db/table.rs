//! Table handles: the per-table entry point for adding and finding rows.

use serde_json::Value;
use tracing::{debug, warn};

use super::api::{Context, DatabaseError, DatabaseResult};
use super::row::LiveRow;
use crate::catalog::{ColumnDef, KeyShape, KeyValue};
use crate::media::Media;
use crate::predicate::{self, Query};
use crate::storage::{Record, StorageError};

/// A value headed for a new row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Value(Value),
    Media(Media),
}

impl From<Value> for Cell {
    fn from(v: Value) -> Self {
        Cell::Value(v)
    }
}

impl From<Media> for Cell {
    fn from(m: Media) -> Self {
        Cell::Media(m)
    }
}

/// Field values for [`Table::add`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowValues {
    cells: Vec<(String, Cell)>,
}

impl RowValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a plain field. Setting the same field twice keeps the last value.
    pub fn with(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.cell(field.into(), Cell::Value(value.into()))
    }

    /// Set a media field. The payload is stored before the row is written.
    pub fn with_media(self, field: impl Into<String>, media: Media) -> Self {
        self.cell(field.into(), Cell::Media(media))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn cell(mut self, field: String, cell: Cell) -> Self {
        self.cells.retain(|(f, _)| *f != field);
        self.cells.push((field, cell));
        self
    }
}

impl From<Record> for RowValues {
    fn from(record: Record) -> Self {
        record.into_iter().collect()
    }
}

impl<K: Into<String>, C: Into<Cell>> FromIterator<(K, C)> for RowValues {
    fn from_iter<T: IntoIterator<Item = (K, C)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(RowValues::new(), |acc, (k, c)| acc.cell(k.into(), c.into()))
    }
}

/// A handle on one mirrored table.
///
/// Handles are cheap to create and clone; they hold no row data.
#[derive(Clone)]
pub struct Table {
    name: String,
    ctx: Context,
}

impl Table {
    pub(crate) fn new(name: String, ctx: Context) -> Self {
        Self { name, ctx }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How rows of this table are keyed.
    pub fn key_shape(&self) -> KeyShape {
        self.ctx.keys.resolve(&self.name)
    }

    /// Add a row and return it as read back from the mirror.
    ///
    /// Media payloads are written first and replaced by their references.
    /// With replication on, the stored record is then sent to the remote;
    /// a remote failure is reported but the local row stays.
    pub fn add(&self, values: RowValues) -> DatabaseResult<LiveRow> {
        let shape = self.key_shape();
        let mut record = Record::new();
        let mut media = Vec::new();
        for (field, cell) in values.cells {
            match cell {
                Cell::Value(v) => {
                    record.insert(field, v);
                }
                Cell::Media(m) => media.push((field, m)),
            }
        }

        if !media.is_empty() {
            let identity = match shape.extract(&record) {
                Ok(key) => key.to_identity(),
                Err(_) => ulid::Ulid::new().to_string().to_lowercase(),
            };
            for (field, m) in media {
                let reference = self.ctx.media.save(&self.name, &field, &identity, &m)?;
                record.insert(field, Value::String(reference));
            }
        }

        let key = self.ctx.store.insert(&self.name, &shape, &record)?;
        let stored = self
            .ctx
            .store
            .get_by_key(&self.name, &shape, &key)?
            .ok_or_else(|| DatabaseError::RowNotFound {
                table: self.name.clone(),
                key: key.to_string(),
            })?;

        if let Some(remote) = self.ctx.replica() {
            match remote.insert(&self.name, &stored) {
                Ok(remote_key) if remote_key != key => {
                    warn!(table = %self.name, local = %key, remote = %remote_key, "remote assigned a different key")
                }
                Ok(_) => debug!(table = %self.name, key = %key, "replicated insert"),
                Err(e) => {
                    warn!(table = %self.name, key = %key, error = %e, "remote insert failed");
                    return Err(e.into());
                }
            }
        }

        Ok(LiveRow::new(self.name.clone(), shape, stored, self.ctx.clone()))
    }

    /// First row matching the query, in scan order.
    ///
    /// Every row is evaluated, so a type mismatch anywhere in the table is
    /// reported exactly as [`Table::search`] reports it.
    pub fn get(&self, query: impl Into<Query>) -> DatabaseResult<Option<LiveRow>> {
        Ok(self.search(query)?.into_iter().next())
    }

    /// Look a row up directly by its key.
    pub fn get_by_key(&self, key: impl Into<KeyValue>) -> DatabaseResult<Option<LiveRow>> {
        let shape = self.key_shape();
        let record = self.ctx.store.get_by_key(&self.name, &shape, &key.into())?;
        Ok(record.map(|r| LiveRow::new(self.name.clone(), shape, r, self.ctx.clone())))
    }

    /// Every row matching the query, in scan order.
    pub fn search(&self, query: impl Into<Query>) -> DatabaseResult<Vec<LiveRow>> {
        let records = predicate::filter(self.ctx.store.fetch_all(&self.name)?, query.into())?;
        Ok(records.into_iter().map(|r| self.wrap(r)).collect())
    }

    /// Every row, in scan order.
    pub fn all(&self) -> DatabaseResult<Vec<LiveRow>> {
        self.search(Query::new())
    }

    /// Number of rows.
    pub fn len(&self) -> DatabaseResult<usize> {
        Ok(self.ctx.store.count(&self.name)?)
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> DatabaseResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Columns as they exist in the mirror.
    pub fn schema(&self) -> DatabaseResult<Vec<ColumnDef>> {
        let columns = self.ctx.store.columns(&self.name)?;
        if columns.is_empty() {
            return Err(StorageError::TableNotFound(self.name.clone()).into());
        }
        Ok(columns)
    }

    fn wrap(&self, record: Record) -> LiveRow {
        LiveRow::new(self.name.clone(), self.key_shape(), record, self.ctx.clone())
    }
}
