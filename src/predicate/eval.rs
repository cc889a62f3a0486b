//! Predicate evaluation against decoded records.

use std::cmp::Ordering;

use serde_json::Value;

use super::ast::{Condition, Predicate, Query, MAX_PREDICATE_DEPTH};
use super::error::{PredicateError, PredicateResult};
use crate::storage::Record;

/// Evaluate a predicate against a record.
///
/// A field missing from the record compares as null.
pub fn evaluate(record: &Record, predicate: &Predicate) -> PredicateResult<bool> {
    let depth = predicate.depth();
    if depth > MAX_PREDICATE_DEPTH {
        return Err(PredicateError::TooDeep {
            depth,
            max: MAX_PREDICATE_DEPTH,
        });
    }
    eval(record, predicate)
}

/// Keep the records a query matches, in their original order.
pub fn filter(records: Vec<Record>, query: Query) -> PredicateResult<Vec<Record>> {
    let predicate = query.into_predicate();
    let mut matched = Vec::new();
    for record in records {
        if evaluate(&record, &predicate)? {
            matched.push(record);
        }
    }
    Ok(matched)
}

fn eval(record: &Record, predicate: &Predicate) -> PredicateResult<bool> {
    match predicate {
        Predicate::Field { field, condition } => {
            let value = record.get(field).unwrap_or(&Value::Null);
            eval_condition(field, value, condition)
        }
        Predicate::AllOf(children) => {
            for child in children {
                if !eval(record, child)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::AnyOf(children) => {
            for child in children {
                if eval(record, child)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::Not(inner) => Ok(!eval(record, inner)?),
    }
}

fn eval_condition(field: &str, value: &Value, condition: &Condition) -> PredicateResult<bool> {
    match condition {
        Condition::Equals(operand) => Ok(values_equal(value, operand)),
        Condition::Not(operand) => Ok(!values_equal(value, operand)),
        Condition::OneOf(options) => Ok(options.iter().any(|o| values_equal(value, o))),
        Condition::LessThan(operand) => ordered(field, value, operand, |o| o == Ordering::Less),
        Condition::LessOrEqual(operand) => ordered(field, value, operand, |o| o != Ordering::Greater),
        Condition::GreaterThan(operand) => ordered(field, value, operand, |o| o == Ordering::Greater),
        Condition::GreaterOrEqual(operand) => ordered(field, value, operand, |o| o != Ordering::Less),
    }
}

/// Apply an ordering test. Null on either side never matches.
fn ordered<F>(field: &str, left: &Value, right: &Value, test: F) -> PredicateResult<bool>
where
    F: Fn(Ordering) -> bool,
{
    if left.is_null() || right.is_null() {
        return Ok(false);
    }
    match compare_values(left, right) {
        Some(ordering) => Ok(test(ordering)),
        None => Err(PredicateError::TypeMismatch {
            field: field.to_string(),
            left: type_name(left),
            right: type_name(right),
        }),
    }
}

/// Check if two JSON values are equal, comparing numbers by value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64().zip(y.as_f64()).map(|(x, y)| x == y).unwrap_or(false),
        },
        _ => a == b,
    }
}

/// Compare two JSON values. Only number/number and string/string pairs are ordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
