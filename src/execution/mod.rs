//! Execution rows, checkpoint entries, and the execution store.

mod store;
mod types;

pub use store::{
    ExecutionPatch, ExecutionStore, FileExecutionStore, MemoryExecutionStore, StoreError,
};
pub use types::{
    deserialize_execution_data, serialize_execution_data, ExecutedDataEntry, Execution,
    ExecutionState,
};
