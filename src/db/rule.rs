//! Filter rules evaluated by record stores.
//!
//! A rule is a JSON object mapping dotted field paths to conditions, in the
//! spirit of a document-database query:
//!
//! ```json
//! { "type": "GROUP", "targets": "u1", "name": { "$ne": "Archive" } }
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

use super::Document;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("Rule must be a JSON object")]
    NotAnObject,

    #[error("Unknown operator '{operator}' on field '{field}'")]
    UnknownOperator { field: String, operator: String },

    #[error("Invalid operand for '{operator}' on field '{field}': {reason}")]
    InvalidOperand {
        field: String,
        operator: String,
        reason: String,
    },

    #[error("Field '{0}' mixes operators with plain values")]
    MixedCondition(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq(Value),
    In(Vec<Value>),
    Ne(Value),
    Exists(bool),
}

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    path: String,
    conditions: Vec<Condition>,
}

/// A parsed, validated filter rule. An empty rule matches every document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rule {
    clauses: Vec<Clause>,
}

impl Rule {
    pub fn parse(value: &Value) -> Result<Self, RuleError> {
        let object = value.as_object().ok_or(RuleError::NotAnObject)?;

        let clauses = object
            .iter()
            .map(|(path, condition)| {
                Ok(Clause {
                    path: path.clone(),
                    conditions: parse_conditions(path, condition)?,
                })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;

        Ok(Self { clauses })
    }

    /// Shorthand for `{ field: { "$in": values } }`.
    #[must_use]
    pub fn field_in(path: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            clauses: vec![Clause {
                path: path.into(),
                conditions: vec![Condition::In(values)],
            }],
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        self.clauses.iter().all(|clause| {
            let field = lookup(document, &clause.path);
            clause
                .conditions
                .iter()
                .all(|condition| condition_holds(condition, field))
        })
    }
}

impl TryFrom<Value> for Rule {
    type Error = RuleError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

fn parse_conditions(field: &str, condition: &Value) -> Result<Vec<Condition>, RuleError> {
    let Some(object) = condition.as_object() else {
        return Ok(vec![Condition::Eq(condition.clone())]);
    };

    let operator_count = object.keys().filter(|k| k.starts_with('$')).count();
    if operator_count == 0 {
        return Ok(vec![Condition::Eq(condition.clone())]);
    }
    if operator_count != object.len() {
        return Err(RuleError::MixedCondition(field.to_string()));
    }

    object
        .iter()
        .map(|(operator, operand)| parse_operator(field, operator, operand))
        .collect()
}

fn parse_operator(field: &str, operator: &str, operand: &Value) -> Result<Condition, RuleError> {
    let invalid = |reason: &str| RuleError::InvalidOperand {
        field: field.to_string(),
        operator: operator.to_string(),
        reason: reason.to_string(),
    };

    match operator {
        "$eq" => Ok(Condition::Eq(operand.clone())),
        "$ne" => Ok(Condition::Ne(operand.clone())),
        "$in" => operand
            .as_array()
            .map(|values| Condition::In(values.clone()))
            .ok_or_else(|| invalid("expected an array")),
        "$exists" => operand
            .as_bool()
            .map(Condition::Exists)
            .ok_or_else(|| invalid("expected a boolean")),
        _ => Err(RuleError::UnknownOperator {
            field: field.to_string(),
            operator: operator.to_string(),
        }),
    }
}

fn lookup<'a>(document: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Equality that also looks through populated references: a stored object
/// with an `id` equals the id itself.
fn value_matches(field: &Value, expected: &Value) -> bool {
    if field == expected {
        return true;
    }
    match field {
        Value::Array(items) => items.iter().any(|item| value_matches(item, expected)),
        Value::Object(map) if !expected.is_object() => map.get("id") == Some(expected),
        _ => false,
    }
}

fn condition_holds(condition: &Condition, field: Option<&Value>) -> bool {
    match condition {
        Condition::Eq(expected) => field.is_some_and(|f| value_matches(f, expected)),
        Condition::Ne(expected) => !field.is_some_and(|f| value_matches(f, expected)),
        Condition::In(values) => {
            field.is_some_and(|f| values.iter().any(|expected| value_matches(f, expected)))
        }
        Condition::Exists(expected) => field.is_some_and(|f| !f.is_null()) == *expected,
    }
}
