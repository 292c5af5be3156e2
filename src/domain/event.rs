//! Structured entries of the operation log.
//!
//! The core only records events; they are rendered to display strings when a
//! snapshot is produced.

use std::fmt;

use super::{DeviceType, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    NetworkPowered {
        plants: usize,
        nodes: usize,
        unsupplied: usize,
    },
    Connected {
        node: NodeId,
        supplier: NodeId,
    },
    PlacementFailed {
        node: NodeId,
    },
    SupplierChanged {
        node: NodeId,
        from: Option<NodeId>,
        to: NodeId,
    },
    Reconnected {
        node: NodeId,
        supplier: NodeId,
    },
    NodeRemoved {
        node: NodeId,
        orphaned: usize,
        from_graph: bool,
    },
    CapacityChanged {
        node: NodeId,
        old: Option<f64>,
        new: f64,
    },
    CapacityDegraded {
        node: NodeId,
        pct: f64,
        capacity: f64,
    },
    OverloadAlert {
        node: NodeId,
        load: f64,
        capacity: f64,
    },
    LoadShed {
        node: NodeId,
        parent: NodeId,
        load: f64,
    },
    OverloadResolved {
        node: NodeId,
        ratio: f64,
    },
    OverloadPersists {
        node: NodeId,
        ratio: f64,
    },
    DeviceAdded {
        consumer: NodeId,
        device: String,
        device_type: DeviceType,
    },
    DeviceRemoved {
        consumer: NodeId,
        device: String,
    },
    DeviceAverageChanged {
        consumer: NodeId,
        device: String,
        avg_power: f64,
    },
    ConsumerLoadChanged {
        consumer: NodeId,
        load: f64,
    },
}

impl fmt::Display for NetworkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use NetworkEvent::*;
        match self {
            NetworkPowered {
                plants,
                nodes,
                unsupplied,
            } => write!(
                f,
                "Network powered on: {plants} generation plant(s), {nodes} node(s), {unsupplied} unsupplied"
            ),
            Connected { node, supplier } => {
                write!(f, "Node {node} was connected to supplier {supplier}")
            }
            PlacementFailed { node } => write!(
                f,
                "Node {node} could not be connected: no supplier with enough spare capacity"
            ),
            SupplierChanged {
                node,
                from: Some(from),
                to,
            } => write!(f, "Node {node} switched supplier from {from} to {to}"),
            SupplierChanged {
                node,
                from: None,
                to,
            } => write!(f, "Node {node} switched supplier to {to}"),
            Reconnected { node, supplier } => {
                write!(f, "Node {node} was reconnected to supplier {supplier}")
            }
            NodeRemoved {
                node,
                orphaned,
                from_graph,
            } => {
                let scope = if *from_graph { "removed" } else { "disconnected" };
                write!(f, "Node {node} was {scope}; {orphaned} child node(s) left unsupplied")
            }
            CapacityChanged {
                node,
                old: Some(old),
                new,
            } => write!(f, "Capacity of {node} changed from {old:.3} to {new:.3}"),
            CapacityChanged {
                node,
                old: None,
                new,
            } => write!(f, "Capacity of {node} set to {new:.3}"),
            CapacityDegraded {
                node,
                pct,
                capacity,
            } => write!(
                f,
                "Fault injected on {node}: capacity degraded by {:.1}% to {capacity:.3}",
                pct * 100.0
            ),
            OverloadAlert {
                node,
                load,
                capacity,
            } => write!(
                f,
                "ALERT: node {node} is overloaded ({load:.3} of {capacity:.3})"
            ),
            LoadShed { node, parent, load } => write!(
                f,
                "Load shedding: {node} disconnected from {parent} ({load:.3} shed)"
            ),
            OverloadResolved { node, ratio } => write!(
                f,
                "Overload on {node} resolved (load ratio {:.1}%)",
                ratio * 100.0
            ),
            OverloadPersists { node, ratio } => write!(
                f,
                "Overload on {node} persists after shedding (load ratio {:.1}%)",
                ratio * 100.0
            ),
            DeviceAdded {
                consumer,
                device,
                device_type,
            } => write!(f, "Device {device} ({device_type}) added to consumer {consumer}"),
            DeviceRemoved { consumer, device } => {
                write!(f, "Device {device} removed from consumer {consumer}")
            }
            DeviceAverageChanged {
                consumer,
                device,
                avg_power,
            } => write!(
                f,
                "Average power of device {device} on consumer {consumer} set to {avg_power:.3}"
            ),
            ConsumerLoadChanged { consumer, load } => {
                write!(f, "Consumer {consumer} load is now {load:.3}")
            }
        }
    }
}

/// Append-only list of events accumulated between snapshots.
#[derive(Debug, Default)]
pub struct OperationLog {
    events: Vec<NetworkEvent>,
}

impl OperationLog {
    pub fn push(&mut self, event: NetworkEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[NetworkEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Takes every pending event, leaving the log empty.
    pub fn drain(&mut self) -> Vec<NetworkEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_rendering() {
        let event = NetworkEvent::Connected {
            node: "C1".into(),
            supplier: "DS1".into(),
        };
        assert_eq!(event.to_string(), "Node C1 was connected to supplier DS1");

        let alert = NetworkEvent::OverloadAlert {
            node: "DS1".into(),
            load: 12.0,
            capacity: 10.0,
        };
        assert!(alert.to_string().starts_with("ALERT"));

        let switched = NetworkEvent::SupplierChanged {
            node: "C1".into(),
            from: Some("DS1".into()),
            to: "DS2".into(),
        };
        assert!(switched.to_string().contains("switched supplier"));
    }

    #[test]
    fn test_log_drain_empties() {
        let mut log = OperationLog::default();
        log.push(NetworkEvent::PlacementFailed { node: "X".into() });
        assert_eq!(log.events().len(), 1);
        let drained = log.drain();
        assert_eq!(drained.len(), 1);
        assert!(log.is_empty());
    }
}
