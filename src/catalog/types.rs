//! Column data types and definitions for mirrored tables.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical column types understood by the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Text/string data.
    Text,
    /// Integer numbers.
    Integer,
    /// Floating point numbers.
    Float,
    /// Boolean values (stored as 0/1).
    Boolean,
    /// JSON objects or arrays, stored as encoded text.
    Json,
    /// Dates and timestamps, stored as ISO 8601 strings.
    Timestamp,
    /// Media reference strings pointing into the media store.
    Media,
}

impl DataType {
    /// Map a column type name reported by the remote authority.
    ///
    /// Unknown names fall back to `Text`.
    pub fn from_remote(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" | "text" => DataType::Text,
            "integer" | "int" => DataType::Integer,
            "number" | "float" | "real" | "double" => DataType::Float,
            "bool" | "boolean" => DataType::Boolean,
            "simpleobject" | "object" | "json" | "link_multiple" => DataType::Json,
            "date" | "datetime" | "timestamp" => DataType::Timestamp,
            "media" => DataType::Media,
            _ => DataType::Text,
        }
    }

    /// Recover the logical type from a declared SQLite column type.
    ///
    /// Understands the declarations written by [`DataType::sql_name`] as
    /// well as conventional SQL type names.
    pub fn from_declared(decl: &str) -> Self {
        let upper = decl.to_ascii_uppercase();
        if upper.starts_with("I64") {
            DataType::Integer
        } else if upper.starts_with("F64") {
            DataType::Float
        } else if upper.starts_with("JSON") {
            DataType::Json
        } else if upper.starts_with("TIMESTAMP") {
            DataType::Timestamp
        } else if upper.starts_with("MEDIA") {
            DataType::Media
        } else if upper.starts_with("BOOL") {
            DataType::Boolean
        } else if upper.contains("INT") {
            DataType::Integer
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            DataType::Float
        } else {
            DataType::Text
        }
    }

    /// Infer a type from a sample value.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => DataType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => DataType::Integer,
            Value::Number(_) => DataType::Float,
            Value::Object(_) | Value::Array(_) => DataType::Json,
            Value::String(s) if s.starts_with(crate::media::REFERENCE_PREFIX) => DataType::Media,
            Value::String(s) if looks_like_timestamp(s) => DataType::Timestamp,
            Value::String(_) | Value::Null => DataType::Text,
        }
    }

    /// Check if a JSON value matches this data type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (DataType::Text, Value::String(_)) => true,
            (DataType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (DataType::Float, Value::Number(_)) => true,
            (DataType::Boolean, Value::Bool(_)) => true,
            (DataType::Json, Value::Object(_) | Value::Array(_)) => true,
            (DataType::Timestamp, Value::String(s)) => looks_like_timestamp(s),
            (DataType::Media, Value::String(s)) => s.starts_with(crate::media::REFERENCE_PREFIX),
            _ => false,
        }
    }

    /// Declared SQLite type for this column.
    ///
    /// Every declaration ends in `BLOB` and avoids the substrings SQLite
    /// reads as another affinity, so columns get no affinity and values are
    /// stored exactly as bound: `5.0` stays real and `"007"` stays text.
    pub fn sql_name(&self) -> &'static str {
        match self {
            DataType::Text => "STR BLOB",
            DataType::Integer => "I64 BLOB",
            DataType::Float => "F64 BLOB",
            DataType::Boolean => "BOOL BLOB",
            DataType::Json => "JSON BLOB",
            DataType::Timestamp => "TIMESTAMP BLOB",
            DataType::Media => "MEDIA BLOB",
        }
    }

    /// Short logical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::Json => "json",
            DataType::Timestamp => "timestamp",
            DataType::Media => "media",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn looks_like_timestamp(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// A column as seen by the mirror: a name and a logical type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Data type.
    pub data_type: DataType,
}

impl ColumnDef {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Build a column from the remote authority's `(name, type name)` pair.
    pub fn from_remote(name: impl Into<String>, type_name: &str) -> Self {
        Self::new(name, DataType::from_remote(type_name))
    }
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_remote() {
        assert_eq!(DataType::from_remote("string"), DataType::Text);
        assert_eq!(DataType::from_remote("number"), DataType::Float);
        assert_eq!(DataType::from_remote("integer"), DataType::Integer);
        assert_eq!(DataType::from_remote("bool"), DataType::Boolean);
        assert_eq!(DataType::from_remote("simpleObject"), DataType::Json);
        assert_eq!(DataType::from_remote("media"), DataType::Media);
        assert_eq!(DataType::from_remote("datetime"), DataType::Timestamp);
        assert_eq!(DataType::from_remote("link_single"), DataType::Text);
        assert_eq!(DataType::from_remote("whatever"), DataType::Text);
    }

    #[test]
    fn test_declared_round_trip() {
        for ty in [
            DataType::Text,
            DataType::Integer,
            DataType::Float,
            DataType::Boolean,
            DataType::Json,
            DataType::Timestamp,
            DataType::Media,
        ] {
            assert_eq!(DataType::from_declared(ty.sql_name()), ty);
        }
        assert_eq!(DataType::from_declared("varchar(20)"), DataType::Text);
        assert_eq!(DataType::from_declared("bigint"), DataType::Integer);
        assert_eq!(DataType::from_declared("INTEGER"), DataType::Integer);
        assert_eq!(DataType::from_declared("REAL"), DataType::Float);
        assert_eq!(DataType::from_declared("JSON TEXT"), DataType::Json);
    }

    #[test]
    fn test_infer() {
        assert_eq!(DataType::infer(&json!(3)), DataType::Integer);
        assert_eq!(DataType::infer(&json!(3.5)), DataType::Float);
        assert_eq!(DataType::infer(&json!({"a": 1})), DataType::Json);
        assert_eq!(DataType::infer(&json!("2024-01-02")), DataType::Timestamp);
        assert_eq!(DataType::infer(&json!("media_files/x/1_a_b.png")), DataType::Media);
        assert_eq!(DataType::infer(&json!("hello")), DataType::Text);
    }

    #[test]
    fn test_data_type_matches() {
        assert!(DataType::Text.matches(&json!("hello")));
        assert!(!DataType::Text.matches(&json!(123)));
        assert!(DataType::Integer.matches(&json!(-17)));
        assert!(!DataType::Integer.matches(&json!(3.14)));
        assert!(DataType::Json.matches(&json!([1, 2, 3])));
        assert!(DataType::Boolean.matches(&Value::Null));
    }
}
