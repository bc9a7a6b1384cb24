use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::EngineError;
use crate::flow::names;
use crate::flow::{FlowEdge, FlowGraphDef, FlowNode};

/// Immutable flow graph: petgraph digraph plus a node-id lookup map.
#[derive(Debug)]
pub struct FlowGraph {
    graph: StableDiGraph<FlowNode, FlowEdge>,
    index_map: HashMap<String, NodeIndex>,
}

impl FlowGraph {
    /// Build the adjacency model from a parsed flow definition.
    pub fn build(def: &FlowGraphDef) -> Result<Self, EngineError> {
        let mut graph = StableDiGraph::<FlowNode, FlowEdge>::new();
        let mut index_map: HashMap<String, NodeIndex> = HashMap::new();

        for node in &def.nodes {
            if index_map.contains_key(&node.id) {
                return Err(EngineError::GraphBuild(format!(
                    "Duplicate node id: {}",
                    node.id
                )));
            }
            let idx = graph.add_node(node.clone());
            index_map.insert(node.id.clone(), idx);
        }

        for edge in &def.edges {
            let source_idx = index_map.get(&edge.source).ok_or_else(|| {
                EngineError::GraphBuild(format!("Source node not found: {}", edge.source))
            })?;
            let target_idx = index_map.get(&edge.target).ok_or_else(|| {
                EngineError::GraphBuild(format!("Target node not found: {}", edge.target))
            })?;
            graph.add_edge(*source_idx, *target_idx, edge.clone());
        }

        Ok(FlowGraph { graph, index_map })
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.index_map.contains_key(node_id)
    }

    pub fn node(&self, node_id: &str) -> Option<&FlowNode> {
        self.index_map
            .get(node_id)
            .and_then(|idx| self.graph.node_weight(*idx))
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(|n| n.id.as_str())
    }

    /// Successor node ids, in edge insertion order.
    pub fn successors(&self, node_id: &str) -> Vec<String> {
        self.edges_from(node_id)
            .into_iter()
            .map(|e| e.target.clone())
            .collect()
    }

    /// Predecessor node ids, ordered by the numeric suffix of the source
    /// handle so fan-in positioning is deterministic.
    pub fn predecessors(&self, node_id: &str) -> Vec<String> {
        let mut incoming = self.edges_to(node_id);
        incoming.sort_by_key(|e| e.source_handle_index());
        let mut seen = Vec::new();
        for edge in incoming {
            if !seen.contains(&edge.source) {
                seen.push(edge.source.clone());
            }
        }
        seen
    }

    /// Outgoing edges of a node, in insertion order.
    pub fn edges_from(&self, node_id: &str) -> Vec<&FlowEdge> {
        let Some(idx) = self.index_map.get(node_id) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(*idx, Direction::Outgoing)
            .collect();
        // petgraph iterates most-recently-added first
        edges.reverse();
        edges.into_iter().map(|e| e.weight()).collect()
    }

    /// Incoming edges of a node, in insertion order.
    pub fn edges_to(&self, node_id: &str) -> Vec<&FlowEdge> {
        let Some(idx) = self.index_map.get(node_id) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(*idx, Direction::Incoming)
            .collect();
        edges.reverse();
        edges.into_iter().map(|e| e.weight()).collect()
    }

    pub fn in_degree(&self, node_id: &str) -> usize {
        self.index_map
            .get(node_id)
            .map(|idx| {
                self.graph
                    .edges_directed(*idx, Direction::Incoming)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Nodes with indegree 0, sticky notes excluded.
    pub fn starting_node_ids(&self) -> Vec<String> {
        self.graph
            .node_weights()
            .filter(|n| !names::is_sticky_note(&n.name))
            .filter(|n| self.in_degree(&n.id) == 0)
            .map(|n| n.id.clone())
            .collect()
    }
}
