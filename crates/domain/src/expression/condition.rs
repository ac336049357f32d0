//! Boolean conditions gating reactions and links.

use std::cmp::Ordering;

use regex::Regex;

use super::extract;
use super::mapping::to_number;
use crate::payload::{Payload, Value};

/// Comparison applied by a leaf condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    Exists,
    NotExists,
    /// Anything unrecognised; always evaluates to `false`.
    Unknown(String),
}

impl Operator {
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "equals" => Self::Equals,
            "not_equals" => Self::NotEquals,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            "regex" => Self::Regex,
            "greater_than" => Self::GreaterThan,
            "less_than" => Self::LessThan,
            "greater_equal" => Self::GreaterEqual,
            "less_equal" => Self::LessEqual,
            "exists" => Self::Exists,
            "not_exists" => Self::NotExists,
            _ => Self::Unknown(name.to_string()),
        }
    }
}

/// A parsed condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Logical AND; empty is `true`.
    All(Vec<Condition>),
    /// Logical OR; empty is `false`.
    Any(Vec<Condition>),
    Not(Box<Condition>),
    Leaf {
        field: String,
        operator: Operator,
        value: Option<Value>,
    },
}

impl Condition {
    /// Parse the raw configuration shape:
    ///
    /// - `{"operator": "and" | "or", "conditions": [...]}`
    /// - `{"operator": "not", "condition": {...}}`
    /// - `{"field": "a.b", "operator": "equals", "value": ...}`
    ///
    /// A missing operator means `and`, unless a `field` is present, in
    /// which case it is an `equals` leaf. Non-object input is an empty `and`.
    #[must_use]
    pub fn from_value(raw: &Value) -> Self {
        let Some(map) = raw.as_object() else {
            return Self::All(Vec::new());
        };
        Self::from_payload(map)
    }

    #[must_use]
    pub fn from_payload(map: &Payload) -> Self {
        let operator = map
            .get("operator")
            .and_then(Value::as_str)
            .map(str::to_lowercase);
        let field = map.get("field").and_then(Value::as_str);

        match (operator.as_deref(), field) {
            (Some("and"), _) | (None, None) => Self::All(Self::children(map)),
            (Some("or"), _) => Self::Any(Self::children(map)),
            (Some("not"), _) => Self::Not(Box::new(
                map.get("condition")
                    .map_or(Self::All(Vec::new()), Self::from_value),
            )),
            (operator, field) => Self::Leaf {
                field: field.unwrap_or_default().to_string(),
                operator: operator.map_or(Operator::Equals, Operator::parse),
                value: map.get("value").filter(|v| !v.is_null()).cloned(),
            },
        }
    }

    fn children(map: &Payload) -> Vec<Self> {
        map.get("conditions")
            .and_then(Value::as_list)
            .map(|items| items.iter().map(Self::from_value).collect())
            .unwrap_or_default()
    }

    /// Evaluate this condition against `payload`.
    #[must_use]
    pub fn evaluate(&self, payload: &Payload) -> bool {
        match self {
            Self::All(children) => children.iter().all(|c| c.evaluate(payload)),
            Self::Any(children) => children.iter().any(|c| c.evaluate(payload)),
            Self::Not(inner) => !inner.evaluate(payload),
            Self::Leaf {
                field,
                operator,
                value,
            } => evaluate_leaf(extract(payload, field), operator, value.as_ref()),
        }
    }
}

/// Evaluate a raw condition; an absent or empty condition is `true`.
#[must_use]
pub fn evaluate_condition(payload: &Payload, condition: Option<&Value>) -> bool {
    match condition {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) if map.is_empty() => true,
        Some(raw) => Condition::from_value(raw).evaluate(payload),
    }
}

fn evaluate_leaf(actual: Option<&Value>, operator: &Operator, expected: Option<&Value>) -> bool {
    match operator {
        Operator::Exists => actual.is_some(),
        Operator::NotExists => actual.is_none(),
        Operator::Equals => display_eq(actual, expected),
        Operator::NotEquals => !display_eq(actual, expected),
        Operator::Contains => strings(actual, expected, |a, e| a.contains(e)),
        Operator::NotContains => !strings(actual, expected, |a, e| a.contains(e)),
        Operator::StartsWith => strings(actual, expected, |a, e| a.starts_with(e)),
        Operator::EndsWith => strings(actual, expected, |a, e| a.ends_with(e)),
        Operator::Regex => strings(actual, expected, full_match),
        Operator::GreaterThan => compare(actual, expected).is_some_and(Ordering::is_gt),
        Operator::LessThan => compare(actual, expected).is_some_and(Ordering::is_lt),
        Operator::GreaterEqual => compare(actual, expected).is_some_and(Ordering::is_ge),
        Operator::LessEqual => compare(actual, expected).is_some_and(Ordering::is_le),
        Operator::Unknown(name) => {
            tracing::warn!(operator = %name, "unknown condition operator");
            false
        }
    }
}

fn display_eq(actual: Option<&Value>, expected: Option<&Value>) -> bool {
    match (actual, expected) {
        (None, None) => true,
        (Some(a), Some(e)) => a.to_string() == e.to_string(),
        _ => false,
    }
}

fn strings(
    actual: Option<&Value>,
    expected: Option<&Value>,
    test: impl Fn(&str, &str) -> bool,
) -> bool {
    match (actual, expected) {
        (Some(a), Some(e)) => test(&a.to_string(), &e.to_string()),
        _ => false,
    }
}

fn full_match(haystack: &str, pattern: &str) -> bool {
    match Regex::new(&format!("^(?:{pattern})$")) {
        Ok(re) => re.is_match(haystack),
        Err(err) => {
            tracing::warn!(pattern, %err, "invalid regex in condition");
            false
        }
    }
}

/// Numeric comparison when both sides coerce to numbers, lexical otherwise.
/// A missing side compares equal; `None` only for unordered numbers.
fn compare(actual: Option<&Value>, expected: Option<&Value>) -> Option<Ordering> {
    let (Some(actual), Some(expected)) = (actual, expected) else {
        return Some(Ordering::Equal);
    };
    match (
        to_number(actual).as_f64(),
        to_number(expected).as_f64(),
    ) {
        (Some(a), Some(e)) => a.partial_cmp(&e),
        _ => Some(actual.to_string().cmp(&expected.to_string())),
    }
}
