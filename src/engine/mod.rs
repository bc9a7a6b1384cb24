//! The flow engine: entry point, scheduler, and its supporting pieces.
//!
//! The engine is a function, not a long-lived object: every external handle
//! (stores, registry, streamer, telemetry) arrives through
//! [`ExecuteFlowParams`] and per-execution state dies with the call.

mod combiner;
mod dependencies;
mod executor;
mod pruner;
mod scheduler;
mod state;
mod telemetry;

pub use combiner::combine_inputs;
pub use dependencies::{analyze_dependencies, WaitingNode};
pub use pruner::skipped_successors;
pub use state::RuntimeState;
pub use telemetry::{AnalyticHandlers, NoopAnalyticHandlers};

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::chat::{ChatMessageStore, ChatRole, ChatTurn, NewChatMessage};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::EventEmitter;
use crate::execution::{
    deserialize_execution_data, serialize_execution_data, ExecutedDataEntry, ExecutionPatch,
    ExecutionState, ExecutionStore,
};
use crate::flow::FlowGraphDef;
use crate::graph::FlowGraph;
use crate::nodes::{human_input_action, HumanInput, NodeRunnerRegistry};
use crate::resolver::question_with_files;

use scheduler::{FlowRuntime, ReadyEntry};

/// Per-request API overrides, honored only when the flow enables them.
/// `nodes` is allowlisted by logical node name; `vars` overlays the static
/// variable store under the `$vars` namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverrideConfig {
    #[serde(default)]
    pub vars: Map<String, Value>,
    #[serde(default)]
    pub nodes: HashMap<String, Map<String, Value>>,
}

/// Everything one prediction request hands to the engine.
pub struct ExecuteFlowParams {
    pub flow: FlowGraphDef,
    pub agentflow_id: String,
    pub chat_id: String,
    pub session_id: Option<String>,

    pub question: Option<String>,
    pub form: Option<Map<String, Value>>,
    pub human_input: Option<HumanInput>,
    pub override_config: Option<OverrideConfig>,
    /// The flow's API-override flag; overrides are ignored without it.
    pub api_override_enabled: bool,
    pub uploads: Option<Value>,
    pub uploaded_files_content: Option<String>,
    pub lead_email: Option<String>,
    pub is_internal: bool,

    /// Prior conversation, loaded by the host from the chat-message store.
    pub chat_history: Vec<ChatTurn>,
    /// Static variable store contents for the `$vars` namespace.
    pub variables: Map<String, Value>,

    pub registry: Arc<NodeRunnerRegistry>,
    pub execution_store: Arc<dyn ExecutionStore>,
    pub chat_message_store: Arc<dyn ChatMessageStore>,
    pub emitter: EventEmitter,
    pub telemetry: Option<Arc<dyn AnalyticHandlers>>,
    pub config: EngineConfig,
    pub base_url: Option<String>,
    pub signal: CancellationToken,
}

/// What a completed (or paused) run returns to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRunResult {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    pub form: Map<String, Value>,
    pub chat_id: String,
    pub chat_message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_prompts: Option<Value>,
    pub execution_id: String,
    pub session_id: String,
    pub agent_flow_executed_data: Vec<ExecutedDataEntry>,
}

/// Interpret one agent flow against a live chat session.
///
/// Creates (or resumes) the execution row, drives the scheduler to a
/// terminal state, writes the chat-message rows, and returns the final
/// payload. ERROR and TERMINATED terminals propagate as `Err` after being
/// persisted and streamed.
pub async fn execute_agent_flow(params: ExecuteFlowParams) -> EngineResult<FlowRunResult> {
    let ExecuteFlowParams {
        flow,
        agentflow_id,
        chat_id,
        session_id,
        question,
        form,
        human_input,
        override_config,
        api_override_enabled,
        uploads,
        uploaded_files_content,
        lead_email: _lead_email,
        is_internal: _is_internal,
        chat_history,
        variables,
        registry,
        execution_store,
        chat_message_store,
        emitter,
        telemetry,
        config,
        base_url,
        signal,
    } = params;

    if question.is_some() && form.is_some() {
        return Err(EngineError::BadInput);
    }

    let session_id = session_id.unwrap_or_else(|| chat_id.clone());
    let api_message_id = Uuid::new_v4().to_string();
    let graph = FlowGraph::build(&flow)?;

    let overrides = if api_override_enabled {
        override_config
    } else {
        None
    };
    let mut variables = variables;
    if let Some(overrides) = &overrides {
        for (key, value) in &overrides.vars {
            variables.insert(key.clone(), value.clone());
        }
    }

    let final_input = match (&question, &form) {
        (Some(q), _) => Value::String(question_with_files(q, uploaded_files_content.as_deref())),
        (None, Some(f)) => Value::Object(f.clone()),
        (None, None) => Value::Null,
    };

    let mut runtime_state = RuntimeState::with_form(form.clone().unwrap_or_default());
    let mut entries: Vec<ExecutedDataEntry> = Vec::new();

    let (execution_id, seed) = match &human_input {
        Some(resume) => {
            let latest = execution_store
                .latest_by_session(&agentflow_id, &session_id)
                .await
                .map_err(|e| EngineError::ExecutionStore(e.to_string()))?
                .ok_or_else(|| {
                    EngineError::InvalidResume(format!(
                        "no execution found for session {}",
                        session_id
                    ))
                })?;
            if latest.state != ExecutionState::Stopped {
                return Err(EngineError::InvalidResume(format!(
                    "execution {} is {}, only STOPPED executions can be resumed",
                    latest.id, latest.state
                )));
            }
            let mut checkpoint = deserialize_execution_data(&latest.execution_data);
            if !checkpoint
                .iter()
                .any(|e| e.node_id == resume.start_node_id)
            {
                return Err(EngineError::NodeNotInCheckpoint(resume.start_node_id.clone()));
            }
            if let Some(last) = checkpoint.last() {
                if let Some(state) = last.data.get("state") {
                    runtime_state.rehydrate_state(state);
                }
            }
            // dropping the stale STOPPED entry and seeding the queue happen
            // before any dispatch, so the checkpoint never holds both the
            // stale entry and its replacement
            checkpoint.retain(|e| {
                !(e.node_id == resume.start_node_id && e.status == ExecutionState::Stopped)
            });
            entries = checkpoint;
            execution_store
                .update(
                    &latest.id,
                    ExecutionPatch {
                        state: Some(ExecutionState::InProgress),
                        execution_data: Some(serialize_execution_data(&entries)),
                    },
                )
                .await
                .map_err(|e| EngineError::ExecutionStore(e.to_string()))?;
            chat_message_store
                .clear_latest_action(&chat_id)
                .await
                .map_err(|e| EngineError::ChatStore(e.to_string()))?;
            (latest.id, vec![ReadyEntry::seed(resume.start_node_id.clone())])
        }
        None => {
            let starting = graph.starting_node_ids();
            let has_start_input = starting
                .iter()
                .filter_map(|id| graph.node(id))
                .any(|n| n.inputs.contains_key("startInputType"));
            if !has_start_input {
                return Err(EngineError::StartInput);
            }
            let execution = execution_store
                .create(&agentflow_id, &session_id, "[]")
                .await
                .map_err(|e| EngineError::ExecutionStore(e.to_string()))?;
            (
                execution.id,
                starting.into_iter().map(ReadyEntry::seed).collect(),
            )
        }
    };

    if let Some(telemetry) = &telemetry {
        telemetry.on_chain_start(&agentflow_id, question.as_deref().unwrap_or_default());
    }

    let mut runtime = FlowRuntime {
        graph,
        registry,
        emitter,
        execution_store,
        config,
        signal,
        overrides,
        agentflow_id: agentflow_id.clone(),
        chat_id: chat_id.clone(),
        session_id: session_id.clone(),
        api_message_id: api_message_id.clone(),
        execution_id: execution_id.clone(),
        question: question.clone(),
        uploaded_files_content,
        uploads,
        base_url,
        final_input,
        prior_chat_history: chat_history,
        variables,
        human_input: human_input.clone(),
        runtime_state,
        entries,
    };

    match runtime.run(seed).await {
        Ok(final_status) => {
            let last = runtime.entries.last();
            let text = last
                .and_then(|e| e.output_content())
                .unwrap_or(" ")
                .to_string();
            let follow_up_prompts = last
                .and_then(|e| e.data.get("output"))
                .and_then(|o| o.get("followUpPrompts"))
                .cloned();

            let user_content = question
                .clone()
                .or_else(|| human_input.as_ref().and_then(|h| h.feedback.clone()))
                .unwrap_or_else(|| {
                    serde_json::to_string(&runtime.runtime_state.form).unwrap_or_default()
                });
            chat_message_store
                .add(NewChatMessage {
                    id: None,
                    role: ChatRole::UserMessage,
                    agentflow_id: agentflow_id.clone(),
                    chat_id: chat_id.clone(),
                    session_id: session_id.clone(),
                    content: user_content,
                    ..Default::default()
                })
                .await
                .map_err(|e| EngineError::ChatStore(e.to_string()))?;

            let action = if final_status == ExecutionState::Stopped {
                last.and_then(|e| human_input_action(&e.data)).cloned()
            } else {
                None
            };
            let last_output = last.and_then(|e| e.data.get("output"));
            let pass_through = |field: &str| last_output.and_then(|o| o.get(field)).cloned();
            let api_row = chat_message_store
                .add(NewChatMessage {
                    id: Some(api_message_id),
                    role: ChatRole::ApiMessage,
                    agentflow_id: agentflow_id.clone(),
                    chat_id: chat_id.clone(),
                    session_id: session_id.clone(),
                    content: text.clone(),
                    action,
                    source_documents: pass_through("sourceDocuments"),
                    used_tools: pass_through("usedTools"),
                    file_annotations: pass_through("fileAnnotations"),
                    artifacts: pass_through("artifacts"),
                })
                .await
                .map_err(|e| EngineError::ChatStore(e.to_string()))?;

            if let Some(telemetry) = &telemetry {
                telemetry.on_chain_end(&agentflow_id, &text);
            }

            Ok(FlowRunResult {
                text,
                question,
                form: runtime.runtime_state.form.clone(),
                chat_id,
                chat_message_id: api_row.id,
                follow_up_prompts,
                execution_id,
                session_id,
                agent_flow_executed_data: runtime.entries,
            })
        }
        Err(error) => {
            if let Some(telemetry) = &telemetry {
                // cancellation is not an error signal
                if !matches!(error, EngineError::Aborted) {
                    telemetry.on_chain_error(&agentflow_id, &error.to_string());
                }
            }
            Err(error)
        }
    }
}
