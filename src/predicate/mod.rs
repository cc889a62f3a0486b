//! Predicate engine for `search`/`get` filtering.
//!
//! A closed set of field comparisons combined with `all-of`, `any-of` and
//! `not`, evaluated against decoded records in memory. There is no planner:
//! every query is a full scan followed by [`filter`].

mod ast;
mod error;
mod eval;

pub use ast::{Condition, Predicate, Query, MAX_PREDICATE_DEPTH};
pub use error::{PredicateError, PredicateResult};
pub use eval::{compare_values, evaluate, filter, values_equal};
