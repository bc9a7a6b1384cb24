//! Flow-level error types.

use super::NodeError;
use thiserror::Error;

/// Errors surfaced by the flow engine itself.
///
/// Node bodies report [`NodeError`]; the scheduler wraps the failing node's
/// error into [`EngineError::NodeExecution`] so callers always learn which
/// node broke the run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Flow parse error: {0}")]
    FlowParse(String),
    #[error("Graph build error: {0}")]
    GraphBuild(String),
    #[error("Node not found: {0}")]
    NodeNotFound(String),
    #[error("Question and form input are mutually exclusive")]
    BadInput,
    #[error("No start node declares a start input type")]
    StartInput,
    #[error("Flow execution aborted")]
    Aborted,
    #[error("Max iterations exceeded: {0}")]
    IterationLimit(u32),
    #[error("Node execution error: node={node_id}, error={error}")]
    NodeExecution { node_id: String, error: String },
    #[error("Cannot resume execution: {0}")]
    InvalidResume(String),
    #[error("Node {0} not present in execution checkpoint")]
    NodeNotInCheckpoint(String),
    #[error("Execution store error: {0}")]
    ExecutionStore(String),
    #[error("Chat store error: {0}")]
    ChatStore(String),
    #[error("Node error: {0}")]
    Node(Box<NodeError>),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<NodeError> for EngineError {
    fn from(value: NodeError) -> Self {
        EngineError::Node(Box::new(value))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
