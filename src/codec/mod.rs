//! Value codec between in-memory row values and their stored form.
//!
//! Scalars pass through unchanged. Objects and arrays are stored as
//! canonical JSON text and expanded again on read. Media payloads never
//! reach this module: they are swapped for a reference string by the media
//! store first, and references are plain strings here.
//!
//! Decoding never fails. A string that merely looks like JSON but does not
//! parse comes back exactly as it was stored.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde_json::{Map, Number, Value};

use crate::catalog::DataType;

/// The form a value takes inside a mirror table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ToSql for StoredValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            StoredValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            StoredValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            StoredValue::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            StoredValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            StoredValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl FromSql for StoredValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => StoredValue::Null,
            ValueRef::Integer(i) => StoredValue::Integer(i),
            ValueRef::Real(f) => StoredValue::Real(f),
            ValueRef::Text(t) => StoredValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => StoredValue::Blob(b.to_vec()),
        })
    }
}

/// Encode an in-memory value into its stored form.
pub fn encode(value: &Value) -> StoredValue {
    match value {
        Value::Null => StoredValue::Null,
        Value::Bool(b) => StoredValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                StoredValue::Integer(i)
            } else if let Some(u) = n.as_u64() {
                // beyond SQLite's integer range: keep every digit as text
                StoredValue::Text(u.to_string())
            } else {
                StoredValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => StoredValue::Text(s.clone()),
        // serde_json's default map is ordered, so this output is canonical.
        Value::Object(_) | Value::Array(_) => StoredValue::Text(value.to_string()),
    }
}

/// Decode a stored value with no column type information.
pub fn decode(stored: &StoredValue) -> Value {
    decode_as(stored, None)
}

/// Decode a stored value, using the column's declared type when known.
///
/// The declared type matters for booleans, which SQLite keeps as 0/1, and
/// for unsigned integers too large for SQLite, which are kept as text in
/// numeric columns.
pub fn decode_as(stored: &StoredValue, hint: Option<DataType>) -> Value {
    match stored {
        StoredValue::Null => Value::Null,
        StoredValue::Integer(i) if hint == Some(DataType::Boolean) => Value::Bool(*i != 0),
        StoredValue::Text(s) if matches!(hint, Some(DataType::Integer | DataType::Float)) => {
            match wide_unsigned(s) {
                Some(u) => Value::from(u),
                None => decode_text(s),
            }
        }
        StoredValue::Integer(i) => Value::from(*i),
        StoredValue::Real(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        StoredValue::Text(s) => decode_text(s),
        StoredValue::Blob(b) => Value::Array(b.iter().map(|byte| Value::from(*byte)).collect()),
    }
}

/// Decode text, expanding it when it is an encoded object or array.
pub fn decode_text(s: &str) -> Value {
    if looks_structured(s) {
        if let Ok(v @ (Value::Object(_) | Value::Array(_))) = serde_json::from_str::<Value>(s) {
            return v;
        }
    }
    Value::String(s.to_string())
}

/// The text form of a `u64` above `i64::MAX`, exactly as `encode` writes it.
fn wide_unsigned(s: &str) -> Option<u64> {
    let u: u64 = s.parse().ok()?;
    (u > i64::MAX as u64 && u.to_string() == s).then_some(u)
}

/// Cheap check for text that may hold an encoded object or array.
fn looks_structured(s: &str) -> bool {
    matches!(s.trim_start().as_bytes().first(), Some(b'{') | Some(b'['))
}

/// Encode every field of a record.
pub fn encode_record(record: &Map<String, Value>) -> Vec<(String, StoredValue)> {
    record
        .iter()
        .map(|(k, v)| (k.clone(), encode(v)))
        .collect()
}
