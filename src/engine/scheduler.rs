//! The ready-queue scheduler driving one flow execution.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use crate::chat::ChatTurn;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, NodeError};
use crate::events::EventEmitter;
use crate::execution::{
    serialize_execution_data, ExecutedDataEntry, ExecutionPatch, ExecutionState, ExecutionStore,
};
use crate::flow::names;
use crate::flow::FlowNode;
use crate::graph::FlowGraph;
use crate::nodes::{
    human_input_action, loop_back_target, loop_max_count, HumanInput, NodeRunnerRegistry,
    RunParams,
};
use crate::resolver::ResolveContext;

use super::combiner::combine_inputs;
use super::dependencies::{analyze_dependencies, WaitingNode};
use super::executor::run_node_step;
use super::pruner::skipped_successors;
use super::state::RuntimeState;
use super::OverrideConfig;

/// An entry of the ready queue: a node cleared for dispatch together with
/// its aggregated fan-in payload.
#[derive(Debug, Clone)]
pub(crate) struct ReadyEntry {
    pub node_id: String,
    pub data: Value,
    pub inputs: HashMap<String, Value>,
}

impl ReadyEntry {
    pub fn seed(node_id: impl Into<String>) -> Self {
        ReadyEntry {
            node_id: node_id.into(),
            data: Value::Null,
            inputs: HashMap::new(),
        }
    }
}

/// Everything owned by one execution while its scheduler runs.
pub(crate) struct FlowRuntime {
    pub graph: FlowGraph,
    pub registry: Arc<NodeRunnerRegistry>,
    pub emitter: EventEmitter,
    pub execution_store: Arc<dyn ExecutionStore>,
    pub config: EngineConfig,
    pub signal: CancellationToken,
    pub overrides: Option<OverrideConfig>,

    pub agentflow_id: String,
    pub chat_id: String,
    pub session_id: String,
    pub api_message_id: String,
    pub execution_id: String,

    pub question: Option<String>,
    pub uploaded_files_content: Option<String>,
    pub uploads: Option<Value>,
    pub base_url: Option<String>,
    pub final_input: Value,
    pub prior_chat_history: Vec<ChatTurn>,
    pub variables: Map<String, Value>,
    pub human_input: Option<HumanInput>,

    pub runtime_state: RuntimeState,
    pub entries: Vec<ExecutedDataEntry>,
}

impl FlowRuntime {
    /// Drive the queue to a terminal state. Returns the final flow status on
    /// FINISHED/STOPPED; error terminals propagate as `Err` after being
    /// persisted and streamed.
    pub async fn run(&mut self, seed: Vec<ReadyEntry>) -> EngineResult<ExecutionState> {
        let mut queue: VecDeque<ReadyEntry> = seed.into();
        let mut waiting: HashMap<String, WaitingNode> = HashMap::new();
        let mut loop_counts: HashMap<String, u32> = HashMap::new();
        let mut iterations: u32 = 0;

        self.emitter.emit_flow_status(ExecutionState::InProgress);

        while let Some(entry) = queue.pop_front() {
            iterations += 1;
            if iterations > self.config.max_iterations {
                self.persist(Some(ExecutionState::Error)).await?;
                self.emitter.emit_flow_status(ExecutionState::Error);
                return Err(EngineError::IterationLimit(self.config.max_iterations));
            }
            if self.signal.is_cancelled() {
                return self.terminate(&entry.node_id).await;
            }

            let Some(node) = self.graph.node(&entry.node_id).cloned() else {
                tracing::warn!(node_id = %entry.node_id, "queued node not in graph, skipping");
                continue;
            };
            if names::is_sticky_note(&node.name) {
                continue;
            }

            let combined_history = self.combined_history();
            let flow_value = self.flow_namespace(&combined_history);
            let params = self.run_params(&node, entry, &combined_history);
            let resolve_ctx = ResolveContext {
                question: self.question.as_deref(),
                file_content: self.uploaded_files_content.as_deref(),
                chat_history: &combined_history,
                form: &self.runtime_state.form,
                vars: &self.variables,
                flow: &flow_value,
                executed: &self.entries,
            };

            let step = run_node_step(
                &node,
                &self.final_input,
                &self.registry,
                &self.emitter,
                self.overrides.as_ref(),
                &resolve_ctx,
                &params,
                &self.signal,
            )
            .await;

            match step {
                Err(NodeError::Aborted) => return self.terminate(&node.id).await,
                Err(e) => return self.fail_node(&node, e).await,
                Ok(outcome) if outcome.should_stop => {
                    // the stopped entry carries the current state so a later
                    // resume can rehydrate from it
                    let mut data = outcome.output.clone();
                    if let Some(obj) = data.as_object_mut() {
                        obj.insert("state".to_string(), self.runtime_state.state_value());
                    }
                    self.append_entry(&node, data, ExecutionState::Stopped);
                    self.persist(Some(ExecutionState::Stopped)).await?;
                    self.emitter
                        .emit_next(&node.id, &node.label, ExecutionState::Stopped, None);
                    self.emit_snapshot();
                    if let Some(action) = human_input_action(&outcome.output) {
                        self.emitter.emit_action(action.clone());
                    }
                    self.emitter.emit_flow_status(ExecutionState::Stopped);
                    return Ok(ExecutionState::Stopped);
                }
                Ok(outcome) => {
                    let output = outcome.output;
                    self.append_entry(&node, output.clone(), ExecutionState::Finished);
                    self.runtime_state.absorb(&output);
                    self.emitter
                        .emit_next(&node.id, &node.label, ExecutionState::Finished, None);
                    self.emit_snapshot();
                    self.persist(None).await?;

                    self.feed_successors(&node, &output, &mut waiting, &mut queue);
                    self.maybe_loop_back(&node, &output, &mut loop_counts, &mut queue);
                }
            }
        }

        let final_status = fold_final_status(&self.entries);
        self.persist(Some(final_status)).await?;
        self.emitter.emit_flow_status(final_status);
        Ok(final_status)
    }

    /// Feed a finished node's output into the waiting table and enqueue any
    /// successor that became ready. Pruned branches are skipped for this
    /// dispatch only.
    fn feed_successors(
        &self,
        node: &FlowNode,
        output: &Value,
        waiting: &mut HashMap<String, WaitingNode>,
        queue: &mut VecDeque<ReadyEntry>,
    ) {
        let skipped = skipped_successors(node, output, &self.graph);
        for child_id in self.graph.successors(&node.id) {
            if skipped.contains(&child_id) {
                continue;
            }
            let child_is_sticky = self
                .graph
                .node(&child_id)
                .map(|n| names::is_sticky_note(&n.name))
                .unwrap_or(false);
            if child_is_sticky {
                continue;
            }

            let record = waiting
                .entry(child_id.clone())
                .or_insert_with(|| analyze_dependencies(&child_id, &self.graph));
            record
                .received_inputs
                .insert(node.id.clone(), output.clone());
            if record.ready() {
                let record = waiting.remove(&child_id).expect("record just inserted");
                let data = combine_inputs(&record.received_inputs);
                queue.push_back(ReadyEntry {
                    node_id: child_id,
                    data,
                    inputs: record.received_inputs,
                });
            }
        }
    }

    /// Re-enqueue a loop node's target, bounded by the node's own ceiling.
    fn maybe_loop_back(
        &mut self,
        node: &FlowNode,
        output: &Value,
        loop_counts: &mut HashMap<String, u32>,
        queue: &mut VecDeque<ReadyEntry>,
    ) {
        if node.name != names::LOOP_AGENTFLOW {
            return;
        }
        let Some(target) = loop_back_target(output) else {
            return;
        };
        let count = loop_counts.get(&node.id).copied().unwrap_or(0) + 1;
        let max = loop_max_count(output).unwrap_or(self.config.max_loop_count);
        if count < max {
            loop_counts.insert(node.id.clone(), count);
            queue.push_back(ReadyEntry {
                node_id: target.to_string(),
                data: output.get("output").cloned().unwrap_or(Value::Null),
                inputs: HashMap::new(),
            });
            // a human answer applies once, never again on loop re-entry
            self.human_input = None;
        } else {
            tracing::debug!(node_id = %node.id, max, "loop ceiling reached");
        }
    }

    async fn fail_node(
        &mut self,
        node: &FlowNode,
        error: NodeError,
    ) -> EngineResult<ExecutionState> {
        let message = error.to_string();
        self.append_entry(node, json!({"error": message}), ExecutionState::Error);
        self.persist(Some(ExecutionState::Error)).await?;
        self.emitter.emit_next(
            &node.id,
            &node.label,
            ExecutionState::Error,
            Some(message.clone()),
        );
        self.emit_snapshot();
        self.emitter.emit_flow_status(ExecutionState::Error);
        Err(EngineError::NodeExecution {
            node_id: node.id.clone(),
            error: message,
        })
    }

    /// Cancellation terminal: one TERMINATED entry for the interrupted node,
    /// no error text anywhere on the stream.
    async fn terminate(&mut self, node_id: &str) -> EngineResult<ExecutionState> {
        let (id, label) = match self.graph.node(node_id) {
            Some(node) => (node.id.clone(), node.label.clone()),
            None => (node_id.to_string(), node_id.to_string()),
        };
        self.entries.push(ExecutedDataEntry {
            node_id: id.clone(),
            node_label: label.clone(),
            data: json!({}),
            previous_node_ids: self.graph.predecessors(&id),
            status: ExecutionState::Terminated,
        });
        self.persist(Some(ExecutionState::Terminated)).await?;
        self.emitter
            .emit_next(&id, &label, ExecutionState::Terminated, None);
        self.emit_snapshot();
        self.emitter.emit_flow_status(ExecutionState::Terminated);
        Err(EngineError::Aborted)
    }

    fn append_entry(&mut self, node: &FlowNode, data: Value, status: ExecutionState) {
        let label = if node.label.is_empty() {
            node.id.clone()
        } else {
            node.label.clone()
        };
        self.entries.push(ExecutedDataEntry {
            node_id: node.id.clone(),
            node_label: label,
            data,
            previous_node_ids: self.graph.predecessors(&node.id),
            status,
        });
    }

    async fn persist(&self, state: Option<ExecutionState>) -> EngineResult<()> {
        self.execution_store
            .update(
                &self.execution_id,
                ExecutionPatch {
                    state,
                    execution_data: Some(serialize_execution_data(&self.entries)),
                },
            )
            .await
            .map(|_| ())
            .map_err(|e| EngineError::ExecutionStore(e.to_string()))
    }

    fn emit_snapshot(&self) {
        let snapshot = serde_json::to_value(&self.entries).unwrap_or_else(|_| json!([]));
        self.emitter.emit_snapshot(snapshot);
    }

    fn combined_history(&self) -> Vec<ChatTurn> {
        let mut history = self.prior_chat_history.clone();
        history.extend(self.runtime_state.chat_history.iter().cloned());
        history
    }

    /// The `$flow` namespace exposed to variable resolution.
    fn flow_namespace(&self, history: &[ChatTurn]) -> Value {
        let mut flow = json!({
            "chatflowid": self.agentflow_id,
            "chatId": self.chat_id,
            "sessionId": self.session_id,
            "apiMessageId": self.api_message_id,
            "state": self.runtime_state.state_value(),
            "chatHistory": history,
        });
        if let (Some(overrides), Some(obj)) = (&self.overrides, flow.as_object_mut()) {
            obj.insert(
                "overrideConfig".to_string(),
                serde_json::to_value(overrides).unwrap_or(Value::Null),
            );
        }
        flow
    }

    fn run_params(&self, node: &FlowNode, entry: ReadyEntry, history: &[ChatTurn]) -> RunParams {
        let resuming_this_node = self
            .human_input
            .as_ref()
            .map(|h| h.start_node_id == node.id)
            .unwrap_or(false);
        let is_last_node = self.graph.successors(&node.id).is_empty()
            || (node.name == names::HUMAN_INPUT_AGENTFLOW && !resuming_this_node);
        RunParams {
            agentflow_id: self.agentflow_id.clone(),
            chat_id: self.chat_id.clone(),
            session_id: self.session_id.clone(),
            api_message_id: self.api_message_id.clone(),
            is_last_node,
            question: self.question.clone(),
            form: self.runtime_state.form.clone(),
            human_input: self.human_input.clone(),
            incoming: entry.data,
            incoming_by_source: entry.inputs,
            state: self.runtime_state.state_value(),
            chat_history: history.to_vec(),
            uploads: self.uploads.clone(),
            base_url: self.base_url.clone(),
            signal: self.signal.clone(),
        }
    }
}

/// Final flow status over checkpoint entries:
/// TERMINATED > ERROR > STOPPED > FINISHED.
pub(crate) fn fold_final_status(entries: &[ExecutedDataEntry]) -> ExecutionState {
    let mut status = ExecutionState::Finished;
    for entry in entries {
        match entry.status {
            ExecutionState::Terminated => return ExecutionState::Terminated,
            ExecutionState::Error => status = ExecutionState::Error,
            ExecutionState::Stopped if status == ExecutionState::Finished => {
                status = ExecutionState::Stopped;
            }
            _ => {}
        }
    }
    status
}
