//! Accessors for the recognized fields of a node's output record.

use serde_json::Value;

/// `output.content`: the canonical text payload.
pub fn output_content(output: &Value) -> Option<&str> {
    output.get("output")?.get("content")?.as_str()
}

/// `output.conditions[]`: drives branch pruning for decision nodes.
pub fn output_conditions(output: &Value) -> Option<&Vec<Value>> {
    output.get("output")?.get("conditions")?.as_array()
}

/// `output.nodeID`: a loop node's re-entry target.
pub fn loop_back_target(output: &Value) -> Option<&str> {
    output.get("output")?.get("nodeID")?.as_str()
}

/// `output.maxLoopCount`: a loop node's iteration ceiling.
pub fn loop_max_count(output: &Value) -> Option<u32> {
    output
        .get("output")?
        .get("maxLoopCount")?
        .as_u64()
        .map(|v| v as u32)
}

/// `output.humanInputAction`: set while a human-input pause is pending.
pub fn human_input_action(output: &Value) -> Option<&Value> {
    output.get("output")?.get("humanInputAction")
}
