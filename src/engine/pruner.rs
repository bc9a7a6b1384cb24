//! Conditional branch pruning from decision-node outputs.

use std::collections::HashSet;

use serde_json::Value;

use crate::flow::names;
use crate::flow::FlowNode;
use crate::graph::FlowGraph;
use crate::nodes::output_conditions;

/// Successor ids to skip for this dispatch of `node`.
///
/// Each unfulfilled `output.conditions[i]` skips the edge whose source handle
/// is `"<nodeId>-output-<i>"`. Skipping applies to the current dispatch only;
/// a target may still be reached along another path.
pub fn skipped_successors(node: &FlowNode, output: &Value, graph: &FlowGraph) -> HashSet<String> {
    let mut skipped = HashSet::new();
    if !names::is_decision_node(&node.name) {
        return skipped;
    }
    let Some(conditions) = output_conditions(output) else {
        return skipped;
    };

    for (index, condition) in conditions.iter().enumerate() {
        let fulfilled = condition
            .get("isFullfilled")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if fulfilled {
            continue;
        }
        let handle = format!("{}-output-{}", node.id, index);
        for edge in graph.edges_from(&node.id) {
            if edge.source_handle == handle {
                skipped.insert(edge.target.clone());
            }
        }
    }
    skipped
}
