use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Node identifiers are the textual ids used by the tabular files and the API.
pub type NodeId = String;

/// Kind of asset a node represents in the distribution network.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    GenerationPlant,
    TransmissionSubstation,
    DistributionSubstation,
    ConsumerPoint,
}

impl NodeType {
    /// Whether a node of this type may act as the logical supplier of `child`.
    pub fn can_supply(self, child: NodeType) -> bool {
        use NodeType::*;
        match (self, child) {
            (_, GenerationPlant) => false,
            (GenerationPlant, TransmissionSubstation) => true,
            (GenerationPlant, _) => false,
            (TransmissionSubstation, TransmissionSubstation | DistributionSubstation) => true,
            (TransmissionSubstation, ConsumerPoint) => false,
            (DistributionSubstation, DistributionSubstation | ConsumerPoint) => true,
            (DistributionSubstation, TransmissionSubstation) => false,
            (ConsumerPoint, _) => false,
        }
    }

    /// Generation plants are the designated sources of the hierarchy.
    pub fn is_source(self) -> bool {
        matches!(self, NodeType::GenerationPlant)
    }

    pub fn is_consumer(self) -> bool {
        matches!(self, NodeType::ConsumerPoint)
    }
}

/// Kind of physical segment joining two nodes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    TransmissionSegment,
    MvSegment,
    LvDistributionSegment,
}

/// A network asset. Capacity and load are scalar kW-equivalent budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub position_x: f64,
    pub position_y: f64,
    pub nominal_voltage: f64,
    /// `None` only until capacities are initialized.
    pub capacity: Option<f64>,
    pub current_load: f64,
    pub cluster_id: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            position_x: 0.0,
            position_y: 0.0,
            nominal_voltage: 0.0,
            capacity: None,
            current_load: 0.0,
            cluster_id: None,
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position_x = x;
        self.position_y = y;
        self
    }

    pub fn with_voltage(mut self, kv: f64) -> Self {
        self.nominal_voltage = kv;
        self
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_cluster(mut self, cluster_id: impl Into<String>) -> Self {
        self.cluster_id = Some(cluster_id.into());
        self
    }

    /// Load-to-capacity ratio; undefined for a null or non-positive capacity.
    pub fn load_ratio(&self) -> Option<f64> {
        match self.capacity {
            Some(capacity) if capacity > 0.0 => Some(self.current_load / capacity),
            _ => None,
        }
    }

    /// Remaining headroom. A null capacity is treated as unbounded.
    pub fn spare_capacity(&self) -> f64 {
        match self.capacity {
            Some(capacity) => capacity - self.current_load,
            None => f64::INFINITY,
        }
    }

    pub fn is_overloaded(&self) -> bool {
        self.load_ratio().is_some_and(|ratio| ratio > 1.0)
    }

    pub fn distance_to(&self, other: &Node) -> f64 {
        (self.position_x - other.position_x).hypot(self.position_y - other.position_y)
    }
}

/// A physical segment. Edges model adjacency, not logical supply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub edge_type: EdgeType,
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
    pub length: f64,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        edge_type: EdgeType,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        length: f64,
    ) -> Self {
        Self {
            id: id.into(),
            edge_type,
            from_node_id: from.into(),
            to_node_id: to.into(),
            length,
        }
    }

    /// The endpoint opposite to `id`, if `id` is one of the endpoints.
    pub fn other_end(&self, id: &str) -> Option<&str> {
        if self.from_node_id == id {
            Some(&self.to_node_id)
        } else if self.to_node_id == id {
            Some(&self.from_node_id)
        } else {
            None
        }
    }
}

/// Supply status reported for every node in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Normal,
    Warning,
    Overloaded,
    Unsupplied,
}

/// Ratio above which a node is reported as `WARNING`.
pub const WARNING_RATIO: f64 = 0.8;

impl NodeStatus {
    pub fn classify(node: &Node, unsupplied: bool) -> Self {
        if unsupplied {
            return NodeStatus::Unsupplied;
        }
        match node.load_ratio() {
            Some(ratio) if ratio > 1.0 => NodeStatus::Overloaded,
            Some(ratio) if ratio > WARNING_RATIO => NodeStatus::Warning,
            _ => NodeStatus::Normal,
        }
    }
}

/// Service tier derived from a node's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum NetworkType {
    SinglePhase,
    ThreePhase,
    Unknown,
}

/// Largest capacity still served by a single-phase connection.
pub const SINGLE_PHASE_LIMIT: f64 = 13.0;

impl NetworkType {
    pub fn from_capacity(capacity: Option<f64>) -> Self {
        match capacity {
            None => NetworkType::Unknown,
            // Tolerate float noise around the exact tier boundary.
            Some(c) if c <= SINGLE_PHASE_LIMIT + 1e-3 => NetworkType::SinglePhase,
            Some(_) => NetworkType::ThreePhase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case(NodeType::GenerationPlant, NodeType::TransmissionSubstation, true)]
    #[case(NodeType::GenerationPlant, NodeType::DistributionSubstation, false)]
    #[case(NodeType::TransmissionSubstation, NodeType::TransmissionSubstation, true)]
    #[case(NodeType::TransmissionSubstation, NodeType::DistributionSubstation, true)]
    #[case(NodeType::TransmissionSubstation, NodeType::ConsumerPoint, false)]
    #[case(NodeType::DistributionSubstation, NodeType::ConsumerPoint, true)]
    #[case(NodeType::DistributionSubstation, NodeType::DistributionSubstation, true)]
    #[case(NodeType::ConsumerPoint, NodeType::ConsumerPoint, false)]
    #[case(NodeType::DistributionSubstation, NodeType::GenerationPlant, false)]
    fn test_supplier_compatibility(
        #[case] supplier: NodeType,
        #[case] child: NodeType,
        #[case] expected: bool,
    ) {
        assert_eq!(supplier.can_supply(child), expected);
    }

    #[rstest]
    #[case(None, 0.0, NodeStatus::Normal)]
    #[case(Some(10.0), 5.0, NodeStatus::Normal)]
    #[case(Some(10.0), 8.0, NodeStatus::Normal)]
    #[case(Some(10.0), 8.5, NodeStatus::Warning)]
    #[case(Some(10.0), 10.0, NodeStatus::Warning)]
    #[case(Some(10.0), 10.5, NodeStatus::Overloaded)]
    #[case(Some(0.0), 3.0, NodeStatus::Normal)]
    fn test_status_classification(
        #[case] capacity: Option<f64>,
        #[case] load: f64,
        #[case] expected: NodeStatus,
    ) {
        let mut node = Node::new("N", NodeType::DistributionSubstation);
        node.capacity = capacity;
        node.current_load = load;
        assert_eq!(NodeStatus::classify(&node, false), expected);
    }

    #[test]
    fn test_unsupplied_takes_precedence() {
        let mut node = Node::new("N", NodeType::ConsumerPoint).with_capacity(1.0);
        node.current_load = 5.0;
        assert_eq!(NodeStatus::classify(&node, true), NodeStatus::Unsupplied);
    }

    #[rstest]
    #[case(None, NetworkType::Unknown)]
    #[case(Some(10.0), NetworkType::SinglePhase)]
    #[case(Some(13.0), NetworkType::SinglePhase)]
    #[case(Some(13.1), NetworkType::ThreePhase)]
    #[case(Some(25.0), NetworkType::ThreePhase)]
    fn test_network_type_tiers(#[case] capacity: Option<f64>, #[case] expected: NetworkType) {
        assert_eq!(NetworkType::from_capacity(capacity), expected);
    }

    #[test]
    fn test_type_names_round_trip_through_strum() {
        assert_eq!(NodeType::DistributionSubstation.to_string(), "DISTRIBUTION_SUBSTATION");
        assert_eq!(
            NodeType::from_str("CONSUMER_POINT").unwrap(),
            NodeType::ConsumerPoint
        );
        assert_eq!(EdgeType::MvSegment.to_string(), "MV_SEGMENT");
        assert_eq!(NetworkType::SinglePhase.to_string(), "single-phase");
    }

    #[test]
    fn test_spare_capacity_unbounded_when_null() {
        let node = Node::new("N", NodeType::TransmissionSubstation);
        assert!(node.spare_capacity().is_infinite());
        assert!(node.load_ratio().is_none());
        assert!(!node.is_overloaded());
    }

    #[test]
    fn test_other_end() {
        let edge = Edge::new("E", EdgeType::MvSegment, "A", "B", 3.0);
        assert_eq!(edge.other_end("A"), Some("B"));
        assert_eq!(edge.other_end("B"), Some("A"));
        assert_eq!(edge.other_end("C"), None);
    }
}
