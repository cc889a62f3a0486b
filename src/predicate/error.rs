//! Predicate evaluation errors.

use thiserror::Error;

/// Result type for predicate evaluation.
pub type PredicateResult<T> = Result<T, PredicateError>;

/// Predicate evaluation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    #[error("type mismatch on field '{field}': cannot order {left} against {right}")]
    TypeMismatch {
        field: String,
        left: &'static str,
        right: &'static str,
    },

    #[error("predicate nested {depth} levels deep (max {max})")]
    TooDeep { depth: usize, max: usize },
}
