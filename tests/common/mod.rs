//! Shared fixtures: flow builders, stub node runners, and a harness that
//! wires the engine to in-memory stores and drains the event stream.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Once};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use agentflow_engine::{
    create_event_channel, execute_agent_flow, ChatTurn, EngineConfig, EngineResult, EventEmitter,
    ExecuteFlowParams, FlowGraphDef, FlowRunResult, HumanInput, MemoryChatMessageStore,
    MemoryExecutionStore, NodeError, NodeRunner, NodeRunnerRegistry, ResolvedNodeData, RunParams,
    StreamMessage,
};

/// Install the test tracing subscriber once per test binary. Honors
/// `RUST_LOG` so engine-level `tracing` output can be inspected with e.g.
/// `RUST_LOG=agentflow_engine=debug cargo test -- --nocapture`.
fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

pub fn start_node(id: &str) -> Value {
    json!({
        "id": id,
        "name": "startAgentflow",
        "label": "Start",
        "inputs": {"startInputType": "chatInput"}
    })
}

pub fn simple_node(id: &str, name: &str) -> Value {
    json!({"id": id, "name": name, "label": id})
}

pub fn node_with_inputs(id: &str, name: &str, inputs: Value) -> Value {
    json!({"id": id, "name": name, "label": id, "inputs": inputs})
}

pub fn prompt_node(id: &str, prompt: &str) -> Value {
    json!({
        "id": id,
        "name": "llmAgentflow",
        "label": id,
        "inputParams": [{"name": "prompt", "type": "string", "acceptVariable": true}],
        "inputs": {"prompt": prompt}
    })
}

pub fn edge(source: &str, index: u32, target: &str) -> Value {
    json!({
        "source": source,
        "sourceHandle": format!("{}-output-{}", source, index),
        "target": target,
        "targetHandle": format!("{}-input", target)
    })
}

pub fn flow_def(nodes: Vec<Value>, edges: Vec<Value>) -> FlowGraphDef {
    serde_json::from_value(json!({"nodes": nodes, "edges": edges})).unwrap()
}

// --- stub runners ---

/// Returns a fixed output record.
pub struct StaticRunner(pub Value);

#[async_trait]
impl NodeRunner for StaticRunner {
    async fn run(
        &self,
        _data: &ResolvedNodeData,
        _input: &Value,
        _params: &RunParams,
    ) -> Result<Value, NodeError> {
        Ok(self.0.clone())
    }
}

/// `output.content = "<id> output"`.
pub struct ContentRunner;

#[async_trait]
impl NodeRunner for ContentRunner {
    async fn run(
        &self,
        data: &ResolvedNodeData,
        _input: &Value,
        _params: &RunParams,
    ) -> Result<Value, NodeError> {
        Ok(json!({"output": {"content": format!("{} output", data.id)}}))
    }
}

/// Echoes the resolved `prompt` input as content.
pub struct PromptEcho;

#[async_trait]
impl NodeRunner for PromptEcho {
    async fn run(
        &self,
        data: &ResolvedNodeData,
        _input: &Value,
        _params: &RunParams,
    ) -> Result<Value, NodeError> {
        let prompt = data
            .inputs
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(json!({"output": {"content": prompt}}))
    }
}

/// Increments `state.count` on every run.
pub struct StateCounter;

#[async_trait]
impl NodeRunner for StateCounter {
    async fn run(
        &self,
        data: &ResolvedNodeData,
        _input: &Value,
        params: &RunParams,
    ) -> Result<Value, NodeError> {
        let count = params
            .state
            .get("count")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(json!({
            "state": {"count": count + 1},
            "output": {"content": format!("{} pass {}", data.id, count + 1)}
        }))
    }
}

/// Emits the loop-back fields from its own node inputs.
pub struct LoopRunner;

#[async_trait]
impl NodeRunner for LoopRunner {
    async fn run(
        &self,
        data: &ResolvedNodeData,
        _input: &Value,
        _params: &RunParams,
    ) -> Result<Value, NodeError> {
        let mut output = serde_json::Map::new();
        if let Some(target) = data.inputs.get("nodeID") {
            output.insert("nodeID".to_string(), target.clone());
        }
        if let Some(max) = data.inputs.get("maxLoopCount") {
            output.insert("maxLoopCount".to_string(), max.clone());
        }
        output.insert("content".to_string(), json!("looping"));
        Ok(json!({"output": output}))
    }
}

/// Emits a fixed condition vector.
pub struct CondRunner(pub Vec<bool>);

#[async_trait]
impl NodeRunner for CondRunner {
    async fn run(
        &self,
        _data: &ResolvedNodeData,
        _input: &Value,
        _params: &RunParams,
    ) -> Result<Value, NodeError> {
        let conditions: Vec<Value> = self
            .0
            .iter()
            .map(|fulfilled| json!({"isFullfilled": fulfilled}))
            .collect();
        Ok(json!({"output": {"content": "decided", "conditions": conditions}}))
    }
}

/// Cancels the run's own abort signal mid-body, then returns normally.
pub struct CancelInside;

#[async_trait]
impl NodeRunner for CancelInside {
    async fn run(
        &self,
        data: &ResolvedNodeData,
        _input: &Value,
        params: &RunParams,
    ) -> Result<Value, NodeError> {
        params.signal.cancel();
        Ok(json!({"output": {"content": format!("{} finished anyway", data.id)}}))
    }
}

/// Always fails.
pub struct FailingRunner(pub &'static str);

#[async_trait]
impl NodeRunner for FailingRunner {
    async fn run(
        &self,
        _data: &ResolvedNodeData,
        _input: &Value,
        _params: &RunParams,
    ) -> Result<Value, NodeError> {
        Err(NodeError::Execution(self.0.to_string()))
    }
}

/// Human-input node body used on resume: surfaces the caller's feedback.
pub struct HumanResume;

#[async_trait]
impl NodeRunner for HumanResume {
    async fn run(
        &self,
        _data: &ResolvedNodeData,
        _input: &Value,
        params: &RunParams,
    ) -> Result<Value, NodeError> {
        let feedback = params
            .human_input
            .as_ref()
            .and_then(|h| h.feedback.clone())
            .unwrap_or_default();
        Ok(json!({"output": {"content": format!("approved: {}", feedback)}}))
    }
}

/// Records the per-predecessor inputs seen at each dispatch.
#[derive(Clone, Default)]
pub struct FanInRecorder {
    pub seen: Arc<Mutex<Vec<HashMap<String, Value>>>>,
}

#[async_trait]
impl NodeRunner for FanInRecorder {
    async fn run(
        &self,
        data: &ResolvedNodeData,
        _input: &Value,
        params: &RunParams,
    ) -> Result<Value, NodeError> {
        self.seen.lock().push(params.incoming_by_source.clone());
        Ok(json!({"output": {"content": format!("{} merged", data.id)}}))
    }
}

// --- harness ---

pub struct Harness {
    pub def: FlowGraphDef,
    pub registry: Arc<NodeRunnerRegistry>,
    pub execution_store: Arc<MemoryExecutionStore>,
    pub chat_store: Arc<MemoryChatMessageStore>,
    pub config: EngineConfig,
}

pub struct RunOutput {
    pub result: EngineResult<FlowRunResult>,
    pub events: Vec<StreamMessage>,
}

impl Harness {
    pub fn new(def: FlowGraphDef, setup: impl FnOnce(&mut NodeRunnerRegistry)) -> Self {
        init_tracing();
        let mut registry = NodeRunnerRegistry::new();
        setup(&mut registry);
        Harness {
            def,
            registry: Arc::new(registry),
            execution_store: Arc::new(MemoryExecutionStore::new()),
            chat_store: Arc::new(MemoryChatMessageStore::new()),
            config: EngineConfig::default(),
        }
    }

    pub async fn run_question(&self, question: &str) -> RunOutput {
        self.run(Some(question.to_string()), None, CancellationToken::new())
            .await
    }

    pub async fn run_resume(&self, human_input: HumanInput) -> RunOutput {
        self.run(None, Some(human_input), CancellationToken::new())
            .await
    }

    pub async fn run(
        &self,
        question: Option<String>,
        human_input: Option<HumanInput>,
        signal: CancellationToken,
    ) -> RunOutput {
        self.run_with_form(question, None, human_input, signal).await
    }

    pub async fn run_with_form(
        &self,
        question: Option<String>,
        form: Option<serde_json::Map<String, Value>>,
        human_input: Option<HumanInput>,
        signal: CancellationToken,
    ) -> RunOutput {
        let (tx, mut rx) = create_event_channel();
        let params = ExecuteFlowParams {
            flow: self.def.clone(),
            agentflow_id: "flow-1".to_string(),
            chat_id: "chat-1".to_string(),
            session_id: Some("sess-1".to_string()),
            question,
            form,
            human_input,
            override_config: None,
            api_override_enabled: false,
            uploads: None,
            uploaded_files_content: None,
            lead_email: None,
            is_internal: false,
            chat_history: Vec::<ChatTurn>::new(),
            variables: serde_json::Map::new(),
            registry: self.registry.clone(),
            execution_store: self.execution_store.clone(),
            chat_message_store: self.chat_store.clone(),
            emitter: EventEmitter::new("chat-1", tx),
            telemetry: None,
            config: self.config.clone(),
            base_url: None,
            signal,
        };
        let result = execute_agent_flow(params).await;
        let mut events = Vec::new();
        while let Ok(message) = rx.try_recv() {
            events.push(message);
        }
        RunOutput { result, events }
    }
}
