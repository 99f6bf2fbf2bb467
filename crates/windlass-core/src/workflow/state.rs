//! Dotted-path state resolution and template interpolation.
//!
//! The state blackboard is a flat `HashMap<String, Value>` whose top-level
//! keys are the caller input, `initial_state` defaults, and per-step results
//! (`state[step_id] = result`). Several step kinds address into it with dotted
//! paths (`"fetch.invoices.total"`) or interpolate `{{name}}` tokens.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Resolve a dotted path into the state blackboard.
///
/// The first segment addresses a top-level key; remaining segments traverse
/// nested objects (and arrays, by numeric index). Returns `None` on any
/// missing segment, never errors.
pub fn resolve_path<'a>(path: &str, state: &'a HashMap<String, Value>) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = state.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn token_pattern() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("static token pattern"))
}

/// Replace `{{name}}` tokens with the stringified resolved value.
///
/// Tokens are single path segments (`\w+`, not dotted). Unresolvable tokens
/// become the empty string.
pub fn interpolate_string(template: &str, state: &HashMap<String, Value>) -> String {
    token_pattern()
        .replace_all(template, |captures: &regex::Captures<'_>| {
            match state.get(&captures[1]) {
                Some(value) => value_to_string(value),
                None => String::new(),
            }
        })
        .into_owned()
}

/// Interpolate every string value of a JSON map against state.
///
/// String values are interpolated, nested objects are recursed, all other
/// values are copied unchanged. Arrays are not descended into.
pub fn interpolate_object(
    object: &HashMap<String, Value>,
    state: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    object
        .iter()
        .map(|(key, value)| (key.clone(), interpolate_value(value, state)))
        .collect()
}

fn interpolate_value(value: &Value, state: &HashMap<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate_string(s, state)),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, state)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Convert a JSON value to a display string for interpolation.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // For objects/arrays, return compact JSON
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
