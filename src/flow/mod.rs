//! Flow definition model: nodes, edges, logical-name sets, `flowData` parsing.

pub mod names;
mod parser;
mod schema;

pub use parser::{parse_flow_data, parse_flow_value};
pub use schema::{handle_index, FlowEdge, FlowGraphDef, FlowNode, InputParam};
