//! The contract between the engine and node implementations.
//!
//! Node implementations live in an external pool; the engine only knows this
//! trait and dispatches by logical name through [`NodeRunnerRegistry`].

mod output;
mod registry;

pub use output::{
    human_input_action, loop_back_target, loop_max_count, output_conditions, output_content,
};
pub use registry::NodeRunnerRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::chat::ChatTurn;
use crate::error::NodeError;

/// The caller's answer to a paused human-input node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanInput {
    /// The human-input node to re-enter.
    pub start_node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// `"proceed"` or `"reject"`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// A node with its input values fully resolved for one dispatch.
#[derive(Debug, Clone)]
pub struct ResolvedNodeData {
    pub id: String,
    pub name: String,
    pub label: String,
    pub inputs: Map<String, Value>,
}

/// Per-dispatch context handed to a node implementation.
#[derive(Clone)]
pub struct RunParams {
    pub agentflow_id: String,
    pub chat_id: String,
    pub session_id: String,
    pub api_message_id: String,
    /// True when the node has no successors, or is a non-resumed human-input
    /// node whose output becomes the final chat message.
    pub is_last_node: bool,
    pub question: Option<String>,
    pub form: Map<String, Value>,
    pub human_input: Option<HumanInput>,
    /// Aggregated fan-in payload for this dispatch.
    pub incoming: Value,
    /// Per-predecessor outputs backing `incoming`.
    pub incoming_by_source: std::collections::HashMap<String, Value>,
    /// Snapshot of the runtime `state` at dispatch time.
    pub state: Value,
    pub chat_history: Vec<ChatTurn>,
    pub uploads: Option<Value>,
    pub base_url: Option<String>,
    /// Cooperative cancellation; long node bodies should poll it.
    pub signal: CancellationToken,
}

/// A node implementation. The engine treats the returned record as opaque
/// except for the recognized fields (`state`, `chatHistory`, `output.*`).
#[async_trait]
pub trait NodeRunner: Send + Sync {
    async fn run(
        &self,
        data: &ResolvedNodeData,
        input: &Value,
        params: &RunParams,
    ) -> Result<Value, NodeError>;
}
