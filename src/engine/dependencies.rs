//! Per-target dependency analysis and the waiting table records.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::flow::names;
use crate::graph::FlowGraph;

/// Bookkeeping for a node with at least one predecessor in flight.
///
/// A predecessor is either unconditional (`expected_inputs`) or belongs to
/// exactly one conditional group, keyed by its nearest decision ancestor.
#[derive(Debug)]
pub struct WaitingNode {
    pub node_id: String,
    pub received_inputs: HashMap<String, Value>,
    pub expected_inputs: HashSet<String>,
    pub conditional_groups: HashMap<String, Vec<String>>,
    pub is_conditional: bool,
}

impl WaitingNode {
    /// All unconditional predecessors delivered, and at least one delivery
    /// per conditional group.
    pub fn ready(&self) -> bool {
        self.expected_inputs
            .iter()
            .all(|p| self.received_inputs.contains_key(p))
            && self.conditional_groups.values().all(|group| {
                group
                    .iter()
                    .any(|p| self.received_inputs.contains_key(p))
            })
    }
}

/// Build the waiting record for `target` by classifying each predecessor:
/// walk its ancestry depth-first to the nearest decision-set node; found →
/// that decision's conditional group, none → unconditional.
pub fn analyze_dependencies(target: &str, graph: &FlowGraph) -> WaitingNode {
    let mut expected_inputs = HashSet::new();
    let mut conditional_groups: HashMap<String, Vec<String>> = HashMap::new();

    for pred_id in graph.predecessors(target) {
        let is_decision = graph
            .node(&pred_id)
            .map(|n| names::is_decision_node(&n.name))
            .unwrap_or(false);
        if is_decision {
            // a decision predecessor forms its own group
            conditional_groups
                .entry(pred_id.clone())
                .or_default()
                .push(pred_id);
            continue;
        }
        match nearest_decision_ancestor(&pred_id, graph) {
            Some(decision_id) => {
                conditional_groups
                    .entry(decision_id)
                    .or_default()
                    .push(pred_id);
            }
            None => {
                expected_inputs.insert(pred_id);
            }
        }
    }

    let is_conditional = !conditional_groups.is_empty();
    WaitingNode {
        node_id: target.to_string(),
        received_inputs: HashMap::new(),
        expected_inputs,
        conditional_groups,
        is_conditional,
    }
}

fn nearest_decision_ancestor(node_id: &str, graph: &FlowGraph) -> Option<String> {
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(node_id.to_string());
    let mut stack: Vec<String> = graph.predecessors(node_id);

    while let Some(ancestor_id) = stack.pop() {
        if !visited.insert(ancestor_id.clone()) {
            continue;
        }
        if let Some(ancestor) = graph.node(&ancestor_id) {
            if names::is_decision_node(&ancestor.name) {
                return Some(ancestor_id);
            }
        }
        stack.extend(graph.predecessors(&ancestor_id));
    }
    None
}
