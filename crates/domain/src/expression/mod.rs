//! Expression evaluator: path extraction, field mapping and boolean
//! conditions over a [`Payload`] tree.
//!
//! This module is pure: it never touches IO and never fails. Malformed
//! input degrades to "absent" values, `false` conditions or the raw value,
//! with a warning logged where the author likely made a mistake.

mod condition;
mod format;
mod mapping;

pub use condition::{Condition, Operator, evaluate_condition};
pub use mapping::{MappingRule, Transform, TransformKind, apply_mapping};

use crate::payload::{Payload, Value};

/// Resolve a dot-separated `path` inside `payload`.
///
/// The path may be wrapped in `{{ }}` template delimiters. Returns `None`
/// when the path is empty, when any segment is missing or null, or when an
/// intermediate segment is not an object.
#[must_use]
pub fn extract<'a>(payload: &'a Payload, path: &str) -> Option<&'a Value> {
    let path = strip_delimiters(path);
    if path.is_empty() {
        return None;
    }

    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = payload.get(first)?;
    for segment in segments {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => {
                tracing::debug!(path, segment, "cannot navigate into a non-object value");
                return None;
            }
        }
    }

    if current.is_null() { None } else { Some(current) }
}

fn strip_delimiters(path: &str) -> &str {
    let trimmed = path.trim();
    trimmed
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .map_or(trimmed, str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::from_json;

    fn sample() -> Payload {
        from_json(serde_json::json!({
            "issue": {"title": "Bug", "labels": ["a"], "meta": {"id": 7}},
            "empty": null,
            "count": 3
        }))
    }

    #[test]
    fn should_extract_nested_value_by_dot_path() {
        let payload = sample();
        assert_eq!(extract(&payload, "issue.meta.id"), Some(&Value::Int(7)));
    }

    #[test]
    fn should_strip_template_delimiters_and_whitespace() {
        let payload = sample();
        assert_eq!(
            extract(&payload, "{{ issue.title }}"),
            Some(&Value::from("Bug"))
        );
    }

    #[test]
    fn should_return_none_when_segment_is_missing() {
        let payload = sample();
        assert_eq!(extract(&payload, "issue.body"), None);
        assert_eq!(extract(&payload, "nope"), None);
    }

    #[test]
    fn should_return_none_when_traversing_through_a_scalar() {
        let payload = sample();
        assert_eq!(extract(&payload, "count.value"), None);
        assert_eq!(extract(&payload, "issue.labels.0"), None);
    }

    #[test]
    fn should_treat_explicit_null_as_absent() {
        let payload = sample();
        assert_eq!(extract(&payload, "empty"), None);
    }

    #[test]
    fn should_return_none_for_empty_path() {
        let payload = sample();
        assert_eq!(extract(&payload, ""), None);
        assert_eq!(extract(&payload, "{{}}"), None);
    }
}
