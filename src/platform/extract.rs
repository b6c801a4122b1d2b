//! Tolerant field extraction from loosely structured platform responses.
//!
//! The platform's success payloads name their id field inconsistently
//! across calls and API versions. Rather than scattering optional
//! chaining through the client, each call declares an ordered list of
//! candidate field paths and extraction either yields the first hit or
//! fails as a unit.

use serde_json::Value;

/// Extract the first matching string value from `candidates`, tried in
/// order. Paths may be dotted to reach nested objects. Numeric values
/// are rendered to strings, since some responses return numeric ids.
pub fn extract_str(value: &Value, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|path| lookup(value, path))
}

fn lookup(value: &Value, path: &str) -> Option<String> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    match current {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
