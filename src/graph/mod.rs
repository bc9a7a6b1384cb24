//! Immutable adjacency model over a flow definition.
//!
//! The stored graph is a DAG: loop edges are enacted dynamically by the
//! scheduler re-enqueuing a prior node id, never as stored back-edges.

mod builder;

pub use builder::FlowGraph;
