//! Predicate trees used to filter records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum nesting depth for predicates, to keep evaluation off the deep end
/// of the stack.
pub const MAX_PREDICATE_DEPTH: usize = 32;

/// A comparison applied to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Condition {
    Equals(Value),
    LessThan(Value),
    LessOrEqual(Value),
    GreaterThan(Value),
    GreaterOrEqual(Value),
    /// Field is not equal to the operand.
    Not(Value),
    OneOf(Vec<Value>),
}

/// A field condition or a boolean combination of predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Field { field: String, condition: Condition },
    AllOf(Vec<Predicate>),
    AnyOf(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn field(field: impl Into<String>, condition: Condition) -> Self {
        Predicate::Field {
            field: field.into(),
            condition,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::Equals(value.into()))
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::Not(value.into()))
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::LessThan(value.into()))
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::LessOrEqual(value.into()))
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::GreaterThan(value.into()))
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::GreaterOrEqual(value.into()))
    }

    pub fn one_of<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::field(field, Condition::OneOf(values.into_iter().map(Into::into).collect()))
    }

    pub fn all_of(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::AllOf(predicates.into_iter().collect())
    }

    pub fn any_of(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::AnyOf(predicates.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }

    /// Maximum nesting depth of this tree. Leaves have depth 1.
    ///
    /// Walks with an explicit stack rather than recursing.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            match node {
                Predicate::Field { .. } => {}
                Predicate::AllOf(children) | Predicate::AnyOf(children) => {
                    pending.extend(children.iter().map(|c| (c, level + 1)));
                }
                Predicate::Not(inner) => pending.push((inner, level + 1)),
            }
        }
        deepest
    }
}

/// What `search`/`get` filter on: predicates plus field-equality shorthand.
///
/// Everything in a query is combined with `all-of`. An empty query matches
/// every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    predicates: Vec<Predicate>,
    equals: BTreeMap<String, Value>,
}

impl Query {
    /// A query that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Add a field-equals-value shorthand condition.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(field.into(), value.into());
        self
    }

    /// Check if the query has no conditions at all.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.equals.is_empty()
    }

    /// Fold predicates and shorthand into a single `all-of` predicate.
    pub fn into_predicate(self) -> Predicate {
        let mut all = self.predicates;
        all.extend(
            self.equals
                .into_iter()
                .map(|(field, value)| Predicate::field(field, Condition::Equals(value))),
        );
        Predicate::AllOf(all)
    }
}

impl From<Predicate> for Query {
    fn from(predicate: Predicate) -> Self {
        Query::new().filter(predicate)
    }
}

impl From<Vec<Predicate>> for Query {
    fn from(predicates: Vec<Predicate>) -> Self {
        Query {
            predicates,
            equals: BTreeMap::new(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Query {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        iter.into_iter().fold(Query::new(), |q, (k, v)| q.eq(k, v))
    }
}
