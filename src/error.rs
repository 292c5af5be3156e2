use thiserror::Error;

use crate::domain::NodeId;

/// Failures a request against the network can surface to its caller.
///
/// Placement failures and capacity violations are not represented here: the
/// former leave the node unsupplied and the latter are repaired by shedding.
#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("device {device} not found on consumer {consumer}")]
    DeviceNotFound { consumer: NodeId, device: String },

    #[error("node {0} is not a consumer point")]
    NotAConsumer(NodeId),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("assigning {parent} as supplier of {node} would create a cycle")]
    CycleDetected { node: NodeId, parent: NodeId },

    #[error("{parent} is not physically connected to {node}")]
    NotAdjacent { node: NodeId, parent: NodeId },

    #[error("{0} is a generation plant and cannot be re-parented")]
    RootReparent(NodeId),

    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    #[error("edge {0} already exists")]
    DuplicateEdge(String),

    #[error("edge {edge} references unknown node {node}")]
    MissingEndpoint { edge: String, node: NodeId },
}

impl GridError {
    /// Structural violations: the request was well formed but would break
    /// the forest shape of the hierarchy.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            GridError::CycleDetected { .. } | GridError::RootReparent(_)
        )
    }
}

/// Startup failures: the process does not serve requests when these occur.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("no network files at {nodes} / {edges} and no generator configured")]
    MissingSource { nodes: String, edges: String },

    #[error("invalid generator configuration: {0}")]
    InvalidGenerator(#[from] validator::ValidationErrors),

    #[error("inconsistent network data: {0}")]
    Graph(#[from] GridError),
}
