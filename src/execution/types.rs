use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a flow execution, and of each checkpoint entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    #[serde(rename = "INPROGRESS")]
    InProgress,
    #[serde(rename = "FINISHED")]
    Finished,
    #[serde(rename = "STOPPED")]
    Stopped,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "TERMINATED")]
    Terminated,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::InProgress => "INPROGRESS",
            ExecutionState::Finished => "FINISHED",
            ExecutionState::Stopped => "STOPPED",
            ExecutionState::Error => "ERROR",
            ExecutionState::Terminated => "TERMINATED",
        }
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One checkpoint entry: a node's terminal transition within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedDataEntry {
    pub node_id: String,
    pub node_label: String,
    /// The node's full output record.
    pub data: Value,
    pub previous_node_ids: Vec<String>,
    pub status: ExecutionState,
}

impl ExecutedDataEntry {
    /// The canonical text payload: `data.output.content`.
    pub fn output_content(&self) -> Option<&str> {
        self.data.get("output")?.get("content")?.as_str()
    }
}

/// Serialize checkpoint entries for the execution row / event snapshots.
pub fn serialize_execution_data(entries: &[ExecutedDataEntry]) -> String {
    serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_string())
}

/// Inverse of [`serialize_execution_data`]; tolerates an empty row.
pub fn deserialize_execution_data(raw: &str) -> Vec<ExecutedDataEntry> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(raw).unwrap_or_default()
}

/// Persisted execution row. The store is the system of record between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    pub agentflow_id: String,
    pub session_id: String,
    pub state: ExecutionState,
    /// Serialized checkpoint ([`serialize_execution_data`]).
    pub execution_data: String,
    pub created_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_date: Option<DateTime<Utc>>,
}
