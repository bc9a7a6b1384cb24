//! Agent flow execution engine.
//!
//! Interprets a user-authored directed graph of agent nodes against a live
//! chat session: dependency-driven scheduling with conditional branch
//! pruning, fan-in input aggregation, durable checkpoint/resume for human
//! approval, `{{…}}` variable resolution over layered namespaces, bounded
//! loop-back iteration, event streaming, and cooperative cancellation.
//!
//! Node implementations are external: the engine dispatches them through
//! [`NodeRunnerRegistry`] and only interprets the recognized output fields.

pub mod chat;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod execution;
pub mod flow;
pub mod graph;
pub mod nodes;
pub mod resolver;

pub use crate::chat::{ChatMessageStore, ChatRole, ChatTurn, MemoryChatMessageStore};
pub use crate::config::EngineConfig;
pub use crate::engine::{
    execute_agent_flow, AnalyticHandlers, ExecuteFlowParams, FlowRunResult, OverrideConfig,
};
pub use crate::error::{EngineError, EngineResult, NodeError};
pub use crate::events::{create_event_channel, EventEmitter, FlowEvent, StreamMessage};
pub use crate::execution::{
    ExecutedDataEntry, Execution, ExecutionState, ExecutionStore, FileExecutionStore,
    MemoryExecutionStore,
};
pub use crate::flow::{parse_flow_data, FlowEdge, FlowGraphDef, FlowNode};
pub use crate::graph::FlowGraph;
pub use crate::nodes::{HumanInput, NodeRunner, NodeRunnerRegistry, ResolvedNodeData, RunParams};
