//! One node dispatch: cancellation check, override config, variable
//! resolution, invocation, and the human-input pause protocol.

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::error::NodeError;
use crate::events::EventEmitter;
use crate::execution::ExecutionState;
use crate::flow::names;
use crate::flow::FlowNode;
use crate::nodes::{NodeRunnerRegistry, ResolvedNodeData, RunParams};
use crate::resolver::{resolve_node_inputs, ResolveContext};

use super::OverrideConfig;

#[derive(Debug)]
pub(crate) struct StepOutcome {
    pub output: Value,
    pub should_stop: bool,
}

/// Execute one ready node.
///
/// The caller appends the checkpoint entry and feeds successors; this
/// function owns everything from the abort check to the node's raw output.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_node_step(
    node: &FlowNode,
    final_input: &Value,
    registry: &NodeRunnerRegistry,
    emitter: &EventEmitter,
    overrides: Option<&OverrideConfig>,
    resolve_ctx: &ResolveContext<'_>,
    params: &RunParams,
    signal: &CancellationToken,
) -> Result<StepOutcome, NodeError> {
    if signal.is_cancelled() {
        return Err(NodeError::Aborted);
    }

    emitter.emit_next(&node.id, &node.label, ExecutionState::InProgress, None);

    // deep-copy the declared inputs; the definition stays pristine
    let mut working = node.clone();
    if let Some(overrides) = overrides {
        if let Some(per_node) = overrides.nodes.get(&node.name) {
            for (key, value) in per_node {
                working.inputs.insert(key.clone(), value.clone());
            }
        }
    }
    working.inputs = resolve_node_inputs(&working, resolve_ctx)?;

    // a human-input node without its answer pauses the flow instead of running
    let resuming_this_node = params
        .human_input
        .as_ref()
        .map(|h| h.start_node_id == node.id)
        .unwrap_or(false);
    if node.name == names::HUMAN_INPUT_AGENTFLOW && !resuming_this_node {
        return Ok(StepOutcome {
            output: pause_output(node),
            should_stop: true,
        });
    }

    let runner = registry.get(&node.name).ok_or_else(|| {
        NodeError::Config(format!(
            "No implementation registered for node type: {}",
            node.name
        ))
    })?;

    let data = ResolvedNodeData {
        id: working.id.clone(),
        name: working.name.clone(),
        label: working.label.clone(),
        inputs: working.inputs,
    };

    let output = runner.run(&data, final_input, params).await?;

    // honor a cancellation that fired while the node body was running
    if signal.is_cancelled() {
        return Err(NodeError::Aborted);
    }

    Ok(StepOutcome {
        output,
        should_stop: false,
    })
}

/// The synthesized output of a paused human-input node: approve/reject
/// buttons keyed by the node id.
fn pause_output(node: &FlowNode) -> Value {
    json!({
        "output": {
            "humanInputAction": {
                "id": node.id,
                "mapping": {
                    "approve": "PROCEED",
                    "reject": "REJECT"
                },
                "elements": [
                    {"type": "agentflowv2-approve-button", "label": "Proceed"},
                    {"type": "agentflowv2-reject-button", "label": "Reject"}
                ],
                "data": {
                    "nodeId": node.id,
                    "nodeLabel": node.label
                }
            }
        }
    })
}
