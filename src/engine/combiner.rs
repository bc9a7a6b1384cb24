//! Fan-in input aggregation.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

/// Merge the outputs delivered by a node's predecessors into one input
/// record. Deterministic: predecessors are visited in source-id order and
/// null outputs are dropped first.
pub fn combine_inputs(received: &HashMap<String, Value>) -> Value {
    let mut sources: Vec<(&String, &Value)> =
        received.iter().filter(|(_, v)| !v.is_null()).collect();
    sources.sort_by(|a, b| a.0.cmp(b.0));

    match sources.len() {
        0 => Value::Null,
        1 => sources[0].1.clone(),
        _ => merge_many(&sources),
    }
}

fn merge_many(sources: &[(&String, &Value)]) -> Value {
    let mut json_map = Map::new();
    let mut binary_map = Map::new();
    let mut texts: Vec<String> = Vec::new();
    let mut first_error: Option<Value> = None;

    for (source_id, input) in sources {
        match input.as_object() {
            None => {
                json_map.insert((*source_id).clone(), (*input).clone());
            }
            Some(fields) => {
                if let Some(json_part) = fields.get("json") {
                    json_map.insert((*source_id).clone(), json_part.clone());
                }
                if let Some(text) = fields.get("text").and_then(Value::as_str) {
                    texts.push(text.to_string());
                }
                if let Some(binary) = fields.get("binary") {
                    binary_map.insert((*source_id).clone(), binary.clone());
                }
                if first_error.is_none() {
                    if let Some(error) = fields.get("error") {
                        if !error.is_null() {
                            first_error = Some(error.clone());
                        }
                    }
                }
            }
        }
    }

    let combined_text = texts.join("\n");

    if json_map.is_empty() && binary_map.is_empty() && first_error.is_none() && !texts.is_empty() {
        return json!({ "json": { "text": combined_text } });
    }

    let mut merged = Map::new();
    merged.insert("json".to_string(), Value::Object(json_map));
    if !texts.is_empty() {
        merged.insert("text".to_string(), Value::String(combined_text));
    }
    if !binary_map.is_empty() {
        merged.insert("binary".to_string(), Value::Object(binary_map));
    }
    if let Some(error) = first_error {
        merged.insert("error".to_string(), error);
    }
    Value::Object(merged)
}
