mod engine_error;
mod node_error;

pub use engine_error::{EngineError, EngineResult};
pub use node_error::NodeError;
