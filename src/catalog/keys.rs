//! Primary-key shapes and their resolution per table.
//!
//! Every component that needs to know how a table is keyed asks the same
//! [`KeyResolver`], so the mirror store and live rows can never disagree
//! about which fields identify a record.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field used when a table has no registered key.
pub const DEFAULT_KEY_FIELD: &str = "id";

/// How a table's records are identified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyShape {
    /// A single key column.
    Single(String),
    /// An ordered list of key columns.
    Composite(Vec<String>),
}

impl KeyShape {
    /// Key field names in order.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            KeyShape::Single(field) => vec![field.as_str()],
            KeyShape::Composite(fields) => fields.iter().map(String::as_str).collect(),
        }
    }

    /// Number of key components.
    pub fn arity(&self) -> usize {
        match self {
            KeyShape::Single(_) => 1,
            KeyShape::Composite(fields) => fields.len(),
        }
    }

    /// Check whether `field` is part of the key.
    pub fn contains(&self, field: &str) -> bool {
        self.fields().contains(&field)
    }

    /// Align a key value with this shape, producing one value per key field.
    ///
    /// A one-element tuple is accepted for a single key. Any other arity
    /// mismatch, or a null component, is rejected.
    pub fn components(&self, key: &KeyValue) -> Result<Vec<Value>, KeyError> {
        let values = match (self, key) {
            (KeyShape::Single(_), KeyValue::Single(v)) => vec![v.clone()],
            (KeyShape::Single(_), KeyValue::Composite(vs)) if vs.len() == 1 => vs.clone(),
            (KeyShape::Composite(fields), KeyValue::Composite(vs)) if vs.len() == fields.len() => {
                vs.clone()
            }
            (KeyShape::Composite(fields), KeyValue::Single(v)) if fields.len() == 1 => {
                vec![v.clone()]
            }
            _ => {
                return Err(KeyError::Arity {
                    expected: self.arity(),
                    found: key.arity(),
                })
            }
        };

        let fields = self.fields();
        for (field, value) in fields.iter().zip(&values) {
            if value.is_null() {
                return Err(KeyError::NullComponent((*field).to_string()));
            }
        }
        Ok(values)
    }

    /// Extract the key value from a record.
    pub fn extract(&self, record: &Map<String, Value>) -> Result<KeyValue, KeyError> {
        let mut values = Vec::with_capacity(self.arity());
        for field in self.fields() {
            match record.get(field) {
                Some(Value::Null) => return Err(KeyError::NullComponent(field.to_string())),
                Some(v) => values.push(v.clone()),
                None => return Err(KeyError::MissingField(field.to_string())),
            }
        }
        Ok(match self {
            KeyShape::Single(_) => KeyValue::Single(values.remove(0)),
            KeyShape::Composite(_) => KeyValue::Composite(values),
        })
    }
}

impl fmt::Display for KeyShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyShape::Single(field) => write!(f, "{}", field),
            KeyShape::Composite(fields) => write!(f, "({})", fields.join(", ")),
        }
    }
}

/// A primary key value: a scalar for single keys, a tuple for composite keys.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Single(Value),
    Composite(Vec<Value>),
}

impl KeyValue {
    /// Number of components carried.
    pub fn arity(&self) -> usize {
        match self {
            KeyValue::Single(_) => 1,
            KeyValue::Composite(vs) => vs.len(),
        }
    }

    /// Build a composite key from any list of JSON-convertible values.
    pub fn tuple<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        KeyValue::Composite(values.into_iter().map(Into::into).collect())
    }

    /// Stable string form, used to name media files.
    pub fn to_identity(&self) -> String {
        fn part(v: &Value) -> String {
            match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        }
        match self {
            KeyValue::Single(v) => part(v),
            KeyValue::Composite(vs) => vs.iter().map(part).collect::<Vec<_>>().join("-"),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Single(v) => write!(f, "{}", v),
            KeyValue::Composite(vs) => {
                let parts: Vec<String> = vs.iter().map(|v| v.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

impl From<Value> for KeyValue {
    fn from(v: Value) -> Self {
        KeyValue::Single(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::Single(Value::String(v.to_string()))
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        KeyValue::Single(Value::String(v))
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Single(Value::from(v))
    }
}

impl From<Vec<Value>> for KeyValue {
    fn from(vs: Vec<Value>) -> Self {
        KeyValue::Composite(vs)
    }
}

/// Key shape violations detected before any storage access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("key arity mismatch: expected {expected} component(s), found {found}")]
    Arity { expected: usize, found: usize },

    #[error("key field '{0}' is null")]
    NullComponent(String),

    #[error("key field '{0}' is missing from the record")]
    MissingField(String),
}

/// Maps table names to key shapes.
///
/// Resolution is total: tables without a registration are keyed by
/// [`DEFAULT_KEY_FIELD`].
#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    shapes: HashMap<String, KeyShape>,
}

impl KeyResolver {
    /// Create a resolver with no registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single-field key.
    pub fn single(mut self, table: impl Into<String>, field: impl Into<String>) -> Self {
        self.shapes.insert(table.into(), KeyShape::Single(field.into()));
        self
    }

    /// Register a composite key.
    pub fn composite<I, S>(mut self, table: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.shapes.insert(table.into(), KeyShape::Composite(fields));
        self
    }

    /// Resolve the key shape of a table.
    pub fn resolve(&self, table: &str) -> KeyShape {
        self.shapes
            .get(table)
            .cloned()
            .unwrap_or_else(|| KeyShape::Single(DEFAULT_KEY_FIELD.to_string()))
    }
}
