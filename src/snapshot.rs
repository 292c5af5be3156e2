//! Read-facing view of the network.
//!
//! A snapshot is a flat, preorder list of nodes with their supplier and
//! derived status, the device table and the rendered operation log. Every
//! float is rounded to three decimals here and nowhere else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{
    DeviceType, IoTDevice, NetworkEvent, NetworkType, Node, NodeId, NodeStatus, NodeType,
};
use crate::routing::RoutingService;
use crate::simulation::DeviceSimulator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub tree: Vec<TreeEntry>,
    pub devices: BTreeMap<NodeId, Vec<DeviceEntry>>,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub node_type: NodeType,
    pub position_x: f64,
    pub position_y: f64,
    pub cluster_id: Option<String>,
    pub nominal_voltage: f64,
    pub capacity: Option<f64>,
    pub current_load: f64,
    pub status: NodeStatus,
    pub network_type: NetworkType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    pub name: String,
    pub device_type: DeviceType,
    pub avg_power: f64,
    pub current_power: f64,
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

impl TreeEntry {
    fn from_node(node: &Node, parent_id: Option<NodeId>, unsupplied: bool) -> Self {
        Self {
            id: node.id.clone(),
            parent_id,
            node_type: node.node_type,
            position_x: round3(node.position_x),
            position_y: round3(node.position_y),
            cluster_id: node.cluster_id.clone(),
            nominal_voltage: round3(node.nominal_voltage),
            capacity: node.capacity.map(round3),
            current_load: round3(node.current_load),
            status: NodeStatus::classify(node, unsupplied),
            network_type: NetworkType::from_capacity(node.capacity),
        }
    }
}

impl From<&IoTDevice> for DeviceEntry {
    fn from(device: &IoTDevice) -> Self {
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            device_type: device.device_type,
            avg_power: round3(device.avg_power),
            current_power: round3(device.current_power),
        }
    }
}

impl TreeSnapshot {
    /// Renders the current state. `events` are the log entries accumulated
    /// since the previous snapshot.
    pub fn build(
        service: &RoutingService,
        simulator: &DeviceSimulator,
        events: &[NetworkEvent],
    ) -> Self {
        let tree = service
            .index()
            .iter_preorder()
            .into_iter()
            .filter_map(|id| {
                let node = service.graph().node(&id)?;
                let parent = service.index().get_parent(&id).cloned();
                Some(TreeEntry::from_node(node, parent, service.is_unsupplied(&id)))
            })
            .collect();

        let devices = simulator
            .all()
            .iter()
            .map(|(consumer, list)| {
                (
                    consumer.clone(),
                    list.iter().map(DeviceEntry::from).collect(),
                )
            })
            .collect();

        Self {
            tree,
            devices,
            logs: events.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn entry(&self, id: &str) -> Option<&TreeEntry> {
        self.tree.iter().find(|entry| entry.id == id)
    }
}
