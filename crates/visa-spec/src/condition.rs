use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::answers::AnswerSet;

/// Boolean combinator of a compound condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    And,
    Or,
}

/// Condition tree used by `showIf`, `dependencies` and `requiredIf`.
///
/// The JSON shapes are the ones form bundles are written in:
/// `{"field": id, "value": v}`, `{"field": id, "not": v}` and
/// `{"operator": "and" | "or", "conditions": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Condition {
    Compound {
        operator: Operator,
        conditions: Vec<Condition>,
    },
    Equals {
        field: String,
        value: Value,
    },
    NotEquals {
        field: String,
        not: Value,
    },
}

impl Condition {
    pub fn equals(field: impl Into<String>, value: Value) -> Self {
        Condition::Equals {
            field: field.into(),
            value,
        }
    }

    pub fn not_equals(field: impl Into<String>, value: Value) -> Self {
        Condition::NotEquals {
            field: field.into(),
            not: value,
        }
    }

    pub fn all(conditions: Vec<Condition>) -> Self {
        Condition::Compound {
            operator: Operator::And,
            conditions,
        }
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Condition::Compound {
            operator: Operator::Or,
            conditions,
        }
    }

    /// Evaluates the tree against the answers.
    ///
    /// A field that has not been answered is undefined: it never equals a
    /// declared value, so `value` leaves are false and `not` leaves are true.
    pub fn evaluate(&self, answers: &AnswerSet) -> bool {
        match self {
            Condition::Equals { field, value } => answers
                .get(field)
                .is_some_and(|actual| strict_eq(actual, value)),
            Condition::NotEquals { field, not } => !answers
                .get(field)
                .is_some_and(|actual| strict_eq(actual, not)),
            Condition::Compound {
                operator: Operator::And,
                conditions,
            } => conditions.iter().all(|condition| condition.evaluate(answers)),
            Condition::Compound {
                operator: Operator::Or,
                conditions,
            } => conditions.iter().any(|condition| condition.evaluate(answers)),
        }
    }

    /// Field ids read anywhere in the tree.
    pub fn referenced_fields(&self) -> BTreeSet<&str> {
        let mut fields = BTreeSet::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Condition::Equals { field, .. } | Condition::NotEquals { field, .. } => {
                out.insert(field.as_str());
            }
            Condition::Compound { conditions, .. } => {
                for condition in conditions {
                    condition.collect_fields(out);
                }
            }
        }
    }
}

/// Absent conditions always hold.
pub fn is_active(answers: &AnswerSet, condition: Option<&Condition>) -> bool {
    condition.is_none_or(|condition| condition.evaluate(answers))
}

/// Equality on stored answers: no coercion across JSON types, numbers by value.
pub(crate) fn strict_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(left), Value::Number(right)) => match (left.as_f64(), right.as_f64()) {
            (Some(left), Some(right)) => left == right,
            _ => left == right,
        },
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right)
                    .all(|(left, right)| strict_eq(left, right))
        }
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left.iter().all(|(key, left)| {
                    right
                        .get(key)
                        .is_some_and(|right| strict_eq(left, right))
                })
        }
        _ => actual == expected,
    }
}
