//! Type-safe names and results for the storage layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A decoded record: column name to value.
pub type Record = Map<String, Value>;

/// A validated SQL identifier, used for both table and column names.
///
/// Identifiers are interpolated into statements (quoted), so they are
/// restricted up front:
/// - 1-64 characters
/// - ASCII alphanumerics and underscores only
/// - must start with a letter or underscore
/// - must not use SQLite's reserved `sqlite_` prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName(String);

impl TableName {
    /// Create a new TableName, validating the input.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        validate_identifier(&name)?;
        Ok(Self(name))
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier quoted for use in SQL.
    pub fn quoted(&self) -> String {
        quote(&self.0)
    }

    /// convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate a table or column identifier.
pub fn validate_identifier(name: &str) -> Result<(), InvalidNameError> {
    let first_char = name.chars().next().ok_or(InvalidNameError::Empty)?;

    if name.len() > 64 {
        return Err(InvalidNameError::TooLong(name.len()));
    }

    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(InvalidNameError::InvalidStart(first_char));
    }

    for (i, c) in name.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
        }
    }

    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(InvalidNameError::Reserved(name.to_string()));
    }

    Ok(())
}

/// Quote an already validated identifier.
pub(crate) fn quote(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Error returned when a name fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidNameError {
    #[error("name cannot be empty")]
    Empty,

    #[error("name too long: {0} characters (max 64)")]
    TooLong(usize),

    #[error("name must start with a letter or underscore, found '{0}'")]
    InvalidStart(char),

    #[error("invalid character '{char}' at position {position}")]
    InvalidCharacter { char: char, position: usize },

    #[error("reserved name: {0}")]
    Reserved(String),
}

/// Result of a keyed write against the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The key matched; the count is the number of rows touched.
    Applied(usize),
    /// No row matched the key.
    NotFound,
}

impl WriteOutcome {
    pub(crate) fn from_count(count: usize) -> Self {
        if count == 0 {
            WriteOutcome::NotFound
        } else {
            WriteOutcome::Applied(count)
        }
    }

    /// check if the write hit at least one row
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied(_))
    }
}

/// What a schema synchronization changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaChange {
    /// The table did not exist and was created.
    pub created: bool,
    /// Columns appended to an existing table, in order.
    pub added_columns: Vec<String>,
}

impl SchemaChange {
    /// check if nothing had to change
    pub fn is_noop(&self) -> bool {
        !self.created && self.added_columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["users", "candidateprojectmapping", "_hidden", "t1", "Org_2"] {
            assert!(TableName::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(TableName::new(""), Err(InvalidNameError::Empty));
        assert_eq!(TableName::new("1users"), Err(InvalidNameError::InvalidStart('1')));
        assert!(matches!(
            TableName::new("users; DROP TABLE x"),
            Err(InvalidNameError::InvalidCharacter { char: ';', .. })
        ));
        assert!(matches!(
            TableName::new("a\"b"),
            Err(InvalidNameError::InvalidCharacter { char: '"', position: 1 })
        ));
        assert!(matches!(TableName::new("sqlite_master"), Err(InvalidNameError::Reserved(_))));
        assert!(matches!(TableName::new("x".repeat(65)), Err(InvalidNameError::TooLong(65))));
    }

    #[test]
    fn test_quoted() {
        assert_eq!(TableName::new("users").unwrap().quoted(), "\"users\"");
    }

    #[test]
    fn test_write_outcome() {
        assert_eq!(WriteOutcome::from_count(0), WriteOutcome::NotFound);
        assert_eq!(WriteOutcome::from_count(2), WriteOutcome::Applied(2));
        assert!(WriteOutcome::Applied(1).is_applied());
    }
}
