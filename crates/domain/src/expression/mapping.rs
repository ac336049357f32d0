//! Field mapping: build a new payload from an existing one.

use std::sync::LazyLock;

use regex::Regex;

use super::{extract, format};
use crate::payload::{Payload, Value};

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").ok());

/// How one target field of a mapping obtains its value.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingRule {
    /// Copy the value found at a dot path (absent → null).
    Path(String),
    /// Coerce a source value through a [`Transform`].
    Transform(Transform),
    /// Use the configured value verbatim.
    Literal(Value),
}

/// Coercion applied by a transform descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformKind {
    #[default]
    Direct,
    String,
    Number,
    Boolean,
    Template,
    Format,
}

impl TransformKind {
    /// Case-insensitive lookup; unknown names behave like [`Direct`](Self::Direct).
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "template" => Self::Template,
            "format" => Self::Format,
            _ => Self::Direct,
        }
    }
}

/// A transform descriptor such as
/// `{"type": "number", "source": "issue.id", "default": 0}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transform {
    pub kind: TransformKind,
    pub source: Option<String>,
    pub default: Option<Value>,
    pub template: Option<String>,
    pub format: Option<String>,
}

impl MappingRule {
    /// Classify a raw mapping entry.
    ///
    /// Strings are paths. Objects carrying a `type` or `source` key are
    /// transform descriptors. Anything else is a literal.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(path) => Self::Path(path.clone()),
            Value::Object(map) if map.contains_key("type") || map.contains_key("source") => {
                let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
                Self::Transform(Transform {
                    kind: text("type")
                        .as_deref()
                        .map(TransformKind::parse)
                        .unwrap_or_default(),
                    source: text("source"),
                    default: map.get("default").cloned(),
                    template: text("template"),
                    format: text("format"),
                })
            }
            other => Self::Literal(other.clone()),
        }
    }

    /// Produce the target value for this rule against `input`.
    #[must_use]
    pub fn resolve(&self, input: &Payload) -> Value {
        match self {
            Self::Path(path) => extract(input, path).cloned().unwrap_or_default(),
            Self::Literal(value) => value.clone(),
            Self::Transform(transform) => transform.apply(input),
        }
    }
}

impl Transform {
    fn apply(&self, input: &Payload) -> Value {
        if self.kind == TransformKind::Template && self.source.is_none() {
            return self.render_template(input);
        }

        let Some(source) = self
            .source
            .as_deref()
            .and_then(|path| extract(input, path))
        else {
            return self.default.clone().unwrap_or_default();
        };

        match self.kind {
            TransformKind::Direct => source.clone(),
            TransformKind::String => Value::String(source.to_string()),
            TransformKind::Number => match to_number(source) {
                Value::Null => self.default.clone().unwrap_or_default(),
                number => number,
            },
            TransformKind::Boolean => Value::Bool(to_boolean(source)),
            TransformKind::Template => self.render_template(input),
            TransformKind::Format => Value::String(format::apply(source, self.format.as_deref())),
        }
    }

    fn render_template(&self, input: &Payload) -> Value {
        match &self.template {
            Some(template) => Value::String(render_template(template, input)),
            None => Value::Null,
        }
    }
}

/// Replace every `{{path}}` placeholder with the display string of the
/// value it resolves to; unresolved placeholders become empty strings.
#[must_use]
pub fn render_template(template: &str, input: &Payload) -> String {
    let Some(placeholder) = PLACEHOLDER.as_ref() else {
        return template.to_string();
    };
    placeholder
        .replace_all(template, |caps: &regex::Captures<'_>| {
            extract(input, &caps[1])
                .map(ToString::to_string)
                .unwrap_or_default()
        })
        .into_owned()
}

/// Permissive numeric coercion: integers stay integers, strings are parsed
/// (trimmed, integer first), booleans and containers are not numbers.
pub(super) fn to_number(value: &Value) -> Value {
    match value {
        Value::Int(_) | Value::Float(_) => value.clone(),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().map(Value::Int).unwrap_or_else(|_| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map_or(Value::Null, Value::Float)
            })
        }
        _ => Value::Null,
    }
}

fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
        Value::Int(n) => *n != 0,
        Value::Float(f) => *f != 0.0,
        _ => false,
    }
}

/// Build a new payload whose keys are the mapping's target fields.
///
/// An empty mapping returns `input` unchanged.
#[must_use]
pub fn apply_mapping(input: &Payload, mapping: &Payload) -> Payload {
    if mapping.is_empty() {
        return input.clone();
    }

    mapping
        .iter()
        .map(|(target, rule)| (target.clone(), MappingRule::from_value(rule).resolve(input)))
        .collect()
}
