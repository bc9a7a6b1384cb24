//! Minimal dotted-path lookup into a JSON value.

use serde_json::Value;

/// Walk `root` by dot-separated keys; numeric segments index arrays.
/// Returns `None` as soon as a segment fails to match.
pub fn dotted_lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
