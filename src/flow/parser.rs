//! `flowData` JSON parsing.

use serde_json::Value;

use crate::error::EngineError;

use super::schema::{FlowEdge, FlowGraphDef, FlowNode};

/// Parse the chat flow entity's `flowData` field into a [`FlowGraphDef`].
///
/// Editor nodes nest their payload under `data` (`{id, position, data: {id,
/// name, label, inputParams, inputs}}`); already-flat nodes are accepted as
/// well so checkpointed definitions round-trip.
pub fn parse_flow_data(flow_data: &str) -> Result<FlowGraphDef, EngineError> {
    let raw: Value =
        serde_json::from_str(flow_data).map_err(|e| EngineError::FlowParse(e.to_string()))?;
    parse_flow_value(&raw)
}

/// Same as [`parse_flow_data`] for an already-parsed JSON value.
pub fn parse_flow_value(raw: &Value) -> Result<FlowGraphDef, EngineError> {
    let nodes = raw
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::FlowParse("flowData has no nodes array".into()))?;
    let edges = raw
        .get("edges")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut def = FlowGraphDef::default();
    for node in nodes {
        def.nodes.push(parse_node(node)?);
    }
    for edge in &edges {
        let edge: FlowEdge = serde_json::from_value(edge.clone())
            .map_err(|e| EngineError::FlowParse(format!("bad edge: {}", e)))?;
        def.edges.push(edge);
    }
    Ok(def)
}

fn parse_node(raw: &Value) -> Result<FlowNode, EngineError> {
    let mut flat = match raw.get("data") {
        Some(data) if data.is_object() => data.clone(),
        _ => raw.clone(),
    };
    // the outer editor id is authoritative
    if let (Some(id), Some(obj)) = (raw.get("id"), flat.as_object_mut()) {
        obj.insert("id".to_string(), id.clone());
    }
    serde_json::from_value(flat).map_err(|e| EngineError::FlowParse(format!("bad node: {}", e)))
}
