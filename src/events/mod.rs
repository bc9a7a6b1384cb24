//! Streaming events emitted while a flow executes.
//!
//! Emission is fire-and-forget through an unbounded channel: the engine
//! never blocks on a slow or disconnected client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::execution::ExecutionState;

pub const CREDENTIAL_KEY: &str = "FLOWISE_CREDENTIAL_ID";

/// One emission of the event stream.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event")]
pub enum FlowEvent {
    /// Per-node transition.
    #[serde(rename = "nextAgentFlowEvent", rename_all = "camelCase")]
    NextAgentFlow {
        node_id: String,
        node_label: String,
        status: ExecutionState,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Full checkpoint snapshot, credential keys stripped.
    #[serde(rename = "agentFlowExecutedDataEvent")]
    AgentFlowExecutedData { data: Value },
    /// Flow-level status.
    #[serde(rename = "agentFlowEvent")]
    AgentFlow { status: ExecutionState },
    /// Human-input action descriptor emitted on pause.
    #[serde(rename = "actionEvent")]
    Action { action: Value },
}

/// An event tagged with the chat it belongs to.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMessage {
    pub chat_id: String,
    #[serde(flatten)]
    pub event: FlowEvent,
}

pub type StreamSender = mpsc::UnboundedSender<StreamMessage>;
pub type StreamReceiver = mpsc::UnboundedReceiver<StreamMessage>;

pub fn create_event_channel() -> (StreamSender, StreamReceiver) {
    mpsc::unbounded_channel()
}

/// Sender wrapper keyed by chat id, with an atomic active flag so emission
/// can be cheaply skipped when no listener is attached.
#[derive(Clone)]
pub struct EventEmitter {
    chat_id: String,
    tx: Option<StreamSender>,
    active: Arc<AtomicBool>,
}

impl EventEmitter {
    pub fn new(chat_id: impl Into<String>, tx: StreamSender) -> Self {
        EventEmitter {
            chat_id: chat_id.into(),
            tx: Some(tx),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// An emitter that drops everything; used for internal (non-streaming) calls.
    pub fn disabled(chat_id: impl Into<String>) -> Self {
        EventEmitter {
            chat_id: chat_id.into(),
            tx: None,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn emit(&self, event: FlowEvent) {
        if !self.is_active() {
            return;
        }
        if let Some(tx) = &self.tx {
            let message = StreamMessage {
                chat_id: self.chat_id.clone(),
                event,
            };
            if tx.send(message).is_err() {
                // receiver gone; stop paying for serialization
                self.active.store(false, Ordering::Relaxed);
                tracing::debug!(chat_id = %self.chat_id, "event stream disconnected");
            }
        }
    }

    pub fn emit_next(
        &self,
        node_id: &str,
        node_label: &str,
        status: ExecutionState,
        error: Option<String>,
    ) {
        self.emit(FlowEvent::NextAgentFlow {
            node_id: node_id.to_string(),
            node_label: node_label.to_string(),
            status,
            error,
        });
    }

    /// Emit the checkpoint snapshot with credential keys removed.
    pub fn emit_snapshot(&self, mut snapshot: Value) {
        if !self.is_active() {
            return;
        }
        strip_credential_keys(&mut snapshot);
        self.emit(FlowEvent::AgentFlowExecutedData { data: snapshot });
    }

    pub fn emit_flow_status(&self, status: ExecutionState) {
        self.emit(FlowEvent::AgentFlow { status });
    }

    pub fn emit_action(&self, action: Value) {
        self.emit(FlowEvent::Action { action });
    }
}

/// Recursively remove every `FLOWISE_CREDENTIAL_ID` key.
pub fn strip_credential_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove(CREDENTIAL_KEY);
            for (_, v) in map.iter_mut() {
                strip_credential_keys(v);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_credential_keys(item);
            }
        }
        _ => {}
    }
}
