//! Serde model of a flow definition.
//!
//! A flow is authored in the visual editor and persisted as the chat flow
//! entity's `flowData` JSON. Nodes keep their editor payload under a nested
//! `data` object; [`parse_flow_data`](super::parse_flow_data) flattens that
//! into [`FlowNode`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A declared input parameter of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputParam {
    pub name: String,
    /// Editor type tag (`string`, `options`, `json`, ...). Opaque to the engine.
    #[serde(rename = "type", default)]
    pub type_tag: String,
    /// Whether `{{…}}` references in this parameter's value are resolved.
    #[serde(default)]
    pub accept_variable: bool,
}

/// One node of a flow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    /// Unique within the flow.
    pub id: String,
    /// Logical name, the discriminator for the node type (`llmAgentflow`,
    /// `conditionAgentflow`, ...). The registry maps it to an implementation.
    pub name: String,
    /// Display label shown in the editor and in checkpoint entries.
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub input_params: Vec<InputParam>,
    /// Concrete input values, parameter name to value.
    #[serde(default)]
    pub inputs: Map<String, Value>,
    /// Set for nodes nested inside an iteration container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_node_id: Option<String>,
}

impl FlowNode {
    /// Whether the named parameter is declared with `acceptVariable`.
    pub fn accepts_variable(&self, param: &str) -> bool {
        self.input_params
            .iter()
            .any(|p| p.name == param && p.accept_variable)
    }
}

/// A directed edge carrying one node's output into another's input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    pub source: String,
    /// `"<nodeId>-output-<index>"`; the index routes conditional branches.
    #[serde(default)]
    pub source_handle: String,
    pub target: String,
    #[serde(default)]
    pub target_handle: String,
}

impl FlowEdge {
    /// The numeric branch index of the source handle: first numeric token
    /// after splitting on `-`, defaulting to 0. Used both for branch routing
    /// and for deterministic fan-in ordering.
    pub fn source_handle_index(&self) -> u32 {
        handle_index(&self.source_handle)
    }
}

pub fn handle_index(handle: &str) -> u32 {
    handle
        .split('-')
        .find_map(|token| token.parse::<u32>().ok())
        .unwrap_or(0)
}

/// The full flow definition: nodes plus edges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowGraphDef {
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

impl FlowGraphDef {
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
