//! Storage for the physical topology: every node and segment of the network.
//!
//! Nodes live in a `StableUnGraph` so indices stay valid across removals;
//! `node_indices`/`edge_indices` map textual ids onto those indices.
//! Every entry carries a registration sequence number so that iteration is
//! deterministic regardless of how petgraph recycles vacant slots.

use std::collections::HashMap;

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::EdgeRef;

use crate::domain::{Edge, Node, NodeId};
use crate::error::GridError;

#[derive(Debug, Clone)]
struct Registered<T> {
    seq: u64,
    value: T,
}

#[derive(Debug, Default)]
pub struct PhysicalGraph {
    graph: StableUnGraph<Registered<Node>, Registered<Edge>>,
    node_indices: HashMap<NodeId, NodeIndex>,
    edge_indices: HashMap<String, EdgeIndex>,
    next_seq: u64,
}

impl PhysicalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), GridError> {
        if self.node_indices.contains_key(&node.id) {
            return Err(GridError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        let seq = self.next_seq();
        let index = self.graph.add_node(Registered { seq, value: node });
        self.node_indices.insert(id, index);
        Ok(())
    }

    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GridError> {
        if self.edge_indices.contains_key(&edge.id) {
            return Err(GridError::DuplicateEdge(edge.id));
        }
        if edge.from_node_id == edge.to_node_id {
            return Err(GridError::InvalidRequest(format!(
                "edge {} connects {} to itself",
                edge.id, edge.from_node_id
            )));
        }
        let from = self.index_of_endpoint(&edge, &edge.from_node_id)?;
        let to = self.index_of_endpoint(&edge, &edge.to_node_id)?;
        let id = edge.id.clone();
        let seq = self.next_seq();
        let index = self.graph.add_edge(from, to, Registered { seq, value: edge });
        self.edge_indices.insert(id, index);
        Ok(())
    }

    fn index_of_endpoint(&self, edge: &Edge, node: &str) -> Result<NodeIndex, GridError> {
        self.node_indices
            .get(node)
            .copied()
            .ok_or_else(|| GridError::MissingEndpoint {
                edge: edge.id.clone(),
                node: node.to_string(),
            })
    }

    /// Removes a node together with every incident edge.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let index = self.node_indices.remove(id)?;
        let incident: Vec<String> = self
            .graph
            .edges(index)
            .map(|e| e.weight().value.id.clone())
            .collect();
        for edge_id in incident {
            self.edge_indices.remove(&edge_id);
        }
        self.graph.remove_node(index).map(|entry| entry.value)
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let index = self.edge_indices.remove(id)?;
        self.graph.remove_edge(index).map(|entry| entry.value)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_indices.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        let index = self.node_indices.get(id)?;
        self.graph.node_weight(*index).map(|entry| &entry.value)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        let index = self.node_indices.get(id)?;
        self.graph.node_weight_mut(*index).map(|entry| &mut entry.value)
    }

    pub fn try_node(&self, id: &str) -> Result<&Node, GridError> {
        self.node(id)
            .ok_or_else(|| GridError::NodeNotFound(id.to_string()))
    }

    pub fn node_count(&self) -> usize {
        self.node_indices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_indices.len()
    }

    /// All nodes in registration order.
    pub fn nodes(&self) -> Vec<&Node> {
        let mut entries: Vec<&Registered<Node>> = self.graph.node_weights().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| &entry.value).collect()
    }

    /// All edges in registration order.
    pub fn edges(&self) -> Vec<&Edge> {
        let mut entries: Vec<&Registered<Edge>> = self.graph.edge_weights().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| &entry.value).collect()
    }

    /// Physical neighbours of `id` with the connecting edge, ordered by edge
    /// registration.
    pub fn neighbors(&self, id: &str) -> Vec<(&Node, &Edge)> {
        let Some(&index) = self.node_indices.get(id) else {
            return Vec::new();
        };
        let mut edges: Vec<&Registered<Edge>> =
            self.graph.edges(index).map(|e| e.weight()).collect();
        edges.sort_by_key(|entry| entry.seq);
        edges
            .into_iter()
            .filter_map(|entry| {
                let other = entry.value.other_end(id)?;
                self.node(other).map(|node| (node, &entry.value))
            })
            .collect()
    }

    /// Shortest edge directly joining `a` and `b`, if any.
    pub fn edge_between(&self, a: &str, b: &str) -> Option<&Edge> {
        self.neighbors(a)
            .into_iter()
            .filter(|(node, _)| node.id == b)
            .map(|(_, edge)| edge)
            .min_by(|x, y| x.length.total_cmp(&y.length))
    }

    pub fn are_adjacent(&self, a: &str, b: &str) -> bool {
        self.edge_between(a, b).is_some()
    }
}
