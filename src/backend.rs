//! The single owner of all mutable network state.
//!
//! `GridBackend` composes the routing service, the device simulator and a
//! clock. Every public operation leaves the state consistent and returns a
//! fresh snapshot; callers serialize access through [`AppState`].

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use strum::{Display, EnumString};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Config, SimulationConfig};
use crate::domain::{DeviceType, Edge, EdgeType, NetworkEvent, Node, NodeId, NodeType};
use crate::error::{GridError, LoadError};
use crate::io;
use crate::network::PhysicalGraph;
use crate::routing::RoutingService;
use crate::simulation::{Clock, DeviceSimulator, LoadChange, SystemClock};
use crate::snapshot::TreeSnapshot;

/// Offset of a node added next to an existing one, on both axes.
const ADDED_NODE_OFFSET: f64 = 10.0;
const ADDED_EDGE_LENGTH: f64 = 10.0;
const CONSUMER_VOLTAGE_KV: f64 = 0.127;

/// A structural or capacity mutation of a single node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeAction {
    SetCapacity(f64),
    /// Attach a new consumer point next to the target.
    AddNode,
    DeleteNode,
    ChangeParentRouting,
    NewParent(NodeId),
}

/// A mutation of a consumer's device list.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceAction {
    Add {
        device_type: DeviceType,
        name: Option<String>,
        avg_power: Option<f64>,
    },
    Remove {
        device_id: String,
    },
    SetAverage {
        device_id: String,
        avg_power: f64,
        snap_to_average: bool,
    },
}

/// Fault scenarios a streaming session can replay every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SimulationKind {
    Overload,
    NodeFailure,
    ConsumptionPeak,
}

pub struct GridBackend {
    routing: RoutingService,
    simulator: DeviceSimulator,
    clock: Arc<dyn Clock>,
    settings: SimulationConfig,
}

impl GridBackend {
    /// Loads (or generates) the configured network and powers it on.
    pub fn from_config(cfg: &Config) -> Result<Self, LoadError> {
        let graph = io::load_or_generate(&cfg.network, cfg.generator.as_ref())?;
        Ok(Self::from_graph(graph, cfg, Arc::new(SystemClock)))
    }

    /// Hydrates the hierarchy, seeds devices, sizes capacities and derives
    /// every load from the devices' draw at the clock's current time.
    pub fn from_graph(graph: PhysicalGraph, cfg: &Config, clock: Arc<dyn Clock>) -> Self {
        let mut routing =
            RoutingService::new(graph, cfg.capacity.clone(), cfg.routing.clone());
        routing.hydrate_from_physical();
        routing.reset_loads();

        let consumers: Vec<NodeId> = routing
            .graph()
            .nodes()
            .into_iter()
            .filter(|node| node.node_type.is_consumer())
            .map(|node| node.id.clone())
            .collect();
        let mut simulator = DeviceSimulator::new(cfg.simulation.noise_block_seconds);
        for (consumer, total_avg) in simulator.seed_consumers(&consumers, &cfg.simulation) {
            if let Err(err) = routing.set_consumer_tier(&consumer, total_avg) {
                warn!(node_id = %consumer, error = %err, "cannot size consumer");
            }
        }
        simulator.tick(clock.now_seconds());
        for consumer in &consumers {
            let delta = simulator.current_power_of(consumer);
            routing.apply_load_change(&LoadChange {
                consumer: consumer.clone(),
                delta,
            });
        }
        routing.initialize_capacities();

        let plants = routing.index().get_roots().len();
        let nodes = routing.graph().node_count();
        let unsupplied = routing.unsupplied().len();
        info!(plants, nodes, unsupplied, "network powered on");
        routing.record(NetworkEvent::NetworkPowered {
            plants,
            nodes,
            unsupplied,
        });

        Self {
            routing,
            simulator,
            clock,
            settings: cfg.simulation.clone(),
        }
    }

    pub fn routing(&self) -> &RoutingService {
        &self.routing
    }

    pub fn simulator(&self) -> &DeviceSimulator {
        &self.simulator
    }

    /// Advances the simulator, retries unsupplied nodes and renders the
    /// state. Drains the operation log.
    pub fn snapshot(&mut self) -> TreeSnapshot {
        self.advance();
        self.routing.retry_unsupplied_routing();
        let events = self.routing.drain_events();
        TreeSnapshot::build(&self.routing, &self.simulator, &events)
    }

    fn advance(&mut self) {
        for change in self.simulator.tick(self.clock.now_seconds()) {
            self.routing.apply_load_change(&change);
        }
    }

    /// Applies a node mutation and returns the resulting snapshot.
    pub fn apply(&mut self, id: &str, action: NodeAction) -> Result<TreeSnapshot, GridError> {
        self.routing.graph().try_node(id)?;
        match action {
            NodeAction::SetCapacity(capacity) => self.routing.set_node_capacity(id, capacity)?,
            NodeAction::AddNode => {
                self.add_consumer_next_to(id)?;
            }
            NodeAction::DeleteNode => self.delete_node(id)?,
            NodeAction::ChangeParentRouting => {
                self.routing.change_parent_with_routing(id)?;
            }
            NodeAction::NewParent(parent) => self.routing.force_change_parent(id, &parent)?,
        }
        Ok(self.snapshot())
    }

    /// Creates a consumer point beside `target`, joined by a short LV
    /// segment, and routes it. Returns the new node's id.
    pub fn add_consumer_next_to(&mut self, target: &str) -> Result<NodeId, GridError> {
        let anchor = self.routing.graph().try_node(target)?;
        let id: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let node = Node::new(id.clone(), NodeType::ConsumerPoint)
            .with_position(
                anchor.position_x + ADDED_NODE_OFFSET,
                anchor.position_y + ADDED_NODE_OFFSET,
            )
            .with_voltage(CONSUMER_VOLTAGE_KV)
            .with_capacity(self.routing.rules().single_phase_kw);
        let node = match &anchor.cluster_id {
            Some(cluster) => node.with_cluster(cluster.clone()),
            None => node,
        };
        let edge = Edge::new(
            format!("E_{id}"),
            EdgeType::LvDistributionSegment,
            target,
            id.clone(),
            ADDED_EDGE_LENGTH,
        );
        self.routing.add_node_with_routing(node, vec![edge])?;
        self.simulator.ensure_consumer(&id);
        Ok(id)
    }

    fn delete_node(&mut self, id: &str) -> Result<(), GridError> {
        self.routing.remove_node(id, true)?;
        self.simulator.remove_consumer(id);
        Ok(())
    }

    /// Applies a device mutation on consumer `node_id`.
    pub fn apply_device(
        &mut self,
        node_id: &str,
        action: DeviceAction,
    ) -> Result<TreeSnapshot, GridError> {
        let node = self.routing.graph().try_node(node_id)?;
        if !node.node_type.is_consumer() {
            return Err(GridError::NotAConsumer(node_id.to_string()));
        }
        self.simulator.ensure_consumer(node_id);

        let (event, change) = match action {
            DeviceAction::Add {
                device_type,
                name,
                avg_power,
            } => {
                let (device, change) =
                    self.simulator
                        .add_device(node_id, device_type, name, avg_power)?;
                let event = NetworkEvent::DeviceAdded {
                    consumer: node_id.to_string(),
                    device: device.id,
                    device_type,
                };
                (event, change)
            }
            DeviceAction::Remove { device_id } => {
                let (device, change) = self.simulator.remove_device(node_id, &device_id)?;
                let event = NetworkEvent::DeviceRemoved {
                    consumer: node_id.to_string(),
                    device: device.id,
                };
                (event, change)
            }
            DeviceAction::SetAverage {
                device_id,
                avg_power,
                snap_to_average,
            } => {
                let change = self.simulator.set_device_average_load(
                    node_id,
                    &device_id,
                    avg_power,
                    snap_to_average,
                )?;
                let event = NetworkEvent::DeviceAverageChanged {
                    consumer: node_id.to_string(),
                    device: device_id,
                    avg_power,
                };
                (event, change)
            }
        };

        self.routing.apply_load_change(&change);
        self.routing.record(event);
        let load = self
            .routing
            .graph()
            .node(node_id)
            .map_or(0.0, |node| node.current_load);
        self.routing.record(NetworkEvent::ConsumerLoadChanged {
            consumer: node_id.to_string(),
            load,
        });
        Ok(self.snapshot())
    }

    /// One streaming tick of a fault scenario against `id`.
    ///
    /// A node that already failed is not an error: later ticks just report
    /// the current state.
    pub fn run_simulation(
        &mut self,
        kind: SimulationKind,
        id: &str,
    ) -> Result<TreeSnapshot, GridError> {
        match kind {
            SimulationKind::Overload => self
                .routing
                .force_overload(id, self.settings.overload_pct)?,
            SimulationKind::ConsumptionPeak => self
                .routing
                .force_overload(id, self.settings.consumption_peak_pct)?,
            SimulationKind::NodeFailure => {
                if self.routing.graph().contains(id) {
                    self.delete_node(id)?;
                }
            }
        }
        Ok(self.snapshot())
    }
}

/// Shared handle given to every request handler.
///
/// The mutex is never held across an `.await`.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub backend: Arc<Mutex<GridBackend>>,
}

impl AppState {
    pub fn new(cfg: Config, backend: GridBackend) -> Self {
        Self {
            cfg: Arc::new(cfg),
            backend: Arc::new(Mutex::new(backend)),
        }
    }
}
