//! Table schema definitions for mirrored tables.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::keys::{KeyShape, DEFAULT_KEY_FIELD};
use super::types::{ColumnDef, DataType};

/// A table schema: ordered columns plus the key shape.
///
/// Schemas only ever grow. Columns are appended, never dropped or retyped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Column definitions, in declaration order.
    pub columns: Vec<ColumnDef>,
    /// How rows of this table are identified.
    pub key: KeyShape,
}

impl TableSchema {
    /// Create a new table schema keyed by the default `id` field.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
            key: KeyShape::Single(DEFAULT_KEY_FIELD.to_string()),
        }
    }

    /// Build a schema from the remote authority's `(column, type name)` list.
    pub fn from_remote<I, N, T>(name: impl Into<String>, columns: I, key: KeyShape) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: AsRef<str>,
    {
        let columns = columns
            .into_iter()
            .map(|(n, t)| ColumnDef::from_remote(n, t.as_ref()))
            .collect();
        Self::new(name, columns).with_key(key)
    }

    /// Set the key shape.
    pub fn with_key(mut self, key: KeyShape) -> Self {
        self.key = key;
        self
    }

    /// Get a column definition by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Validate the schema itself.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::Empty(self.name.clone()));
        }
        if self.key.arity() == 0 {
            return Err(SchemaError::InvalidKey(self.name.clone()));
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if col.name.is_empty() {
                return Err(SchemaError::InvalidColumnName(col.name.clone()));
            }
            if !seen.insert(col.name.as_str()) {
                return Err(SchemaError::DuplicateColumn(col.name.clone()));
            }
        }
        Ok(())
    }

    /// Return the schema with every key field present as a column.
    ///
    /// The default `id` key is appended as an integer column so the store can
    /// hand out rowid-based identities. Other missing key fields are text.
    pub fn with_key_columns(mut self) -> Self {
        let missing: Vec<String> = self
            .key
            .fields()
            .into_iter()
            .filter(|f| self.get_column(f).is_none())
            .map(str::to_string)
            .collect();

        for field in missing {
            let data_type = if field == DEFAULT_KEY_FIELD {
                DataType::Integer
            } else {
                DataType::Text
            };
            self.columns.push(ColumnDef::new(field, data_type));
        }
        self
    }

    /// Columns of this schema that are absent from `existing`, in order.
    pub fn missing_from<'a>(&'a self, existing: &[ColumnDef]) -> Vec<&'a ColumnDef> {
        self.columns
            .iter()
            .filter(|c| !existing.iter().any(|e| e.name == c.name))
            .collect()
    }

    /// Append a column.
    pub fn add_column(&mut self, column: ColumnDef) -> Result<(), SchemaError> {
        if self.get_column(&column.name).is_some() {
            return Err(SchemaError::DuplicateColumn(column.name));
        }
        self.columns.push(column);
        Ok(())
    }
}

/// Schema-related errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("invalid column name: '{0}'")]
    InvalidColumnName(String),

    #[error("table '{0}' has no columns")]
    Empty(String),

    #[error("table '{0}' has an empty key")]
    InvalidKey(String),
}

/// Builder for creating table schemas.
pub struct SchemaBuilder {
    name: String,
    columns: Vec<ColumnDef>,
    key: Option<KeyShape>,
}

impl SchemaBuilder {
    /// Start building a new schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            key: None,
        }
    }

    /// Add a column.
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a column with just name and type.
    pub fn add_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(ColumnDef::new(name, data_type));
        self
    }

    /// Set the key shape.
    pub fn key(mut self, key: KeyShape) -> Self {
        self.key = Some(key);
        self
    }

    /// Build the schema.
    pub fn build(self) -> Result<TableSchema, SchemaError> {
        let mut schema = TableSchema::new(self.name, self.columns);
        if let Some(key) = self.key {
            schema = schema.with_key(key);
        }
        schema.validate()?;
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> TableSchema {
        SchemaBuilder::new("candidates")
            .add_column("uid", DataType::Text)
            .add_column("name", DataType::Text)
            .add_column("resume", DataType::Media)
            .key(KeyShape::Single("uid".into()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_schema_validation() {
        let schema = sample_schema();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.key, KeyShape::Single("uid".into()));
    }

    #[test]
    fn test_schema_duplicate_column() {
        let result = SchemaBuilder::new("bad")
            .add_column("name", DataType::Text)
            .add_column("name", DataType::Integer)
            .build();

        assert!(matches!(result, Err(SchemaError::DuplicateColumn(_))));
    }

    #[test]
    fn test_from_remote() {
        let schema = TableSchema::from_remote(
            "scores",
            [("uid", "string"), ("score", "number")],
            KeyShape::Single("uid".into()),
        );
        assert_eq!(schema.column_names(), vec!["uid", "score"]);
        assert_eq!(schema.get_column("score").unwrap().data_type, DataType::Float);
    }

    #[test]
    fn test_key_columns_appended() {
        let schema = TableSchema::new("notes", vec![ColumnDef::new("body", DataType::Text)])
            .with_key_columns();
        assert_eq!(schema.column_names(), vec!["body", "id"]);
        assert_eq!(schema.get_column("id").unwrap().data_type, DataType::Integer);

        let composite = TableSchema::new("org", vec![ColumnDef::new("task", DataType::Text)])
            .with_key(KeyShape::Composite(vec!["proj_uid".into(), "task".into()]))
            .with_key_columns();
        assert_eq!(composite.column_names(), vec!["task", "proj_uid"]);
    }

    #[test]
    fn test_missing_from() {
        let schema = sample_schema();
        let existing = vec![ColumnDef::new("uid", DataType::Text)];
        let missing: Vec<&str> = schema
            .missing_from(&existing)
            .into_iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(missing, vec!["name", "resume"]);
    }

    #[test]
    fn test_add_column() {
        let mut schema = sample_schema();
        schema.add_column(ColumnDef::new("bio", DataType::Text)).unwrap();
        assert!(schema.get_column("bio").is_some());
        assert!(schema.add_column(ColumnDef::new("bio", DataType::Text)).is_err());
    }
}
