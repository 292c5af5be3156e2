//! The placement and repair engine.
//!
//! `RoutingService` owns the physical graph, the logical hierarchy, the set
//! of unsupplied nodes and the operation log. Every mutation keeps three
//! things in step:
//!
//! * the hierarchy stays a forest rooted at generation plants,
//! * `current_load` of every node equals the load of its own subtree,
//! * a node is in the unsupplied set exactly when it cannot reach a plant.
//!
//! Placement lives in [`placement`], overload handling and shedding in
//! [`overload`].

pub mod overload;
pub mod placement;

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info};

use crate::config::RoutingConfig;
use crate::domain::{Edge, NetworkEvent, Node, NodeId, OperationLog};
use crate::error::GridError;
use crate::network::{
    CapacityPlanner, CapacityRules, HierarchyIndex, LoadAggregator, PhysicalGraph, UnsuppliedSet,
};
use crate::simulation::LoadChange;

#[derive(Debug)]
pub struct RoutingService {
    graph: PhysicalGraph,
    index: HierarchyIndex,
    unsupplied: UnsuppliedSet,
    log: OperationLog,
    rules: CapacityRules,
    settings: RoutingConfig,
}

impl RoutingService {
    /// Wraps a loaded graph. The hierarchy is empty until
    /// [`hydrate_from_physical`](Self::hydrate_from_physical) runs.
    pub fn new(graph: PhysicalGraph, rules: CapacityRules, settings: RoutingConfig) -> Self {
        Self {
            graph,
            index: HierarchyIndex::new(),
            unsupplied: UnsuppliedSet::new(),
            log: OperationLog::default(),
            rules,
            settings,
        }
    }

    pub fn graph(&self) -> &PhysicalGraph {
        &self.graph
    }

    pub fn index(&self) -> &HierarchyIndex {
        &self.index
    }

    pub fn unsupplied(&self) -> &UnsuppliedSet {
        &self.unsupplied
    }

    pub fn rules(&self) -> &CapacityRules {
        &self.rules
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    pub fn record(&mut self, event: NetworkEvent) {
        self.log.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<NetworkEvent> {
        self.log.drain()
    }

    pub fn is_unsupplied(&self, id: &str) -> bool {
        self.unsupplied.contains(id)
    }

    /// Builds the hierarchy by a breadth-first sweep of the physical graph
    /// seeded with every generation plant. The first plant or node to reach
    /// a node becomes its parent; nodes no plant reaches are unsupplied.
    pub fn hydrate_from_physical(&mut self) {
        self.index = HierarchyIndex::new();
        self.unsupplied = UnsuppliedSet::new();

        let plants: Vec<NodeId> = self
            .graph
            .nodes()
            .into_iter()
            .filter(|node| node.node_type.is_source())
            .map(|node| node.id.clone())
            .collect();
        for plant in &plants {
            self.index.add_root(plant);
        }

        let mut visited: HashSet<NodeId> = plants.iter().cloned().collect();
        let mut queue: VecDeque<NodeId> = plants.into_iter().collect();
        while let Some(current) = queue.pop_front() {
            let reached: Vec<NodeId> = self
                .graph
                .neighbors(&current)
                .into_iter()
                .map(|(node, _)| node.id.clone())
                .collect();
            for id in reached {
                if visited.insert(id.clone()) {
                    self.index.set_parent(&id, &current);
                    queue.push_back(id);
                }
            }
        }

        let stranded: Vec<NodeId> = self
            .graph
            .nodes()
            .into_iter()
            .filter(|node| !visited.contains(&node.id))
            .map(|node| node.id.clone())
            .collect();
        for id in &stranded {
            self.index.register(id);
            self.unsupplied.insert(id);
        }

        info!(
            nodes = self.index.len(),
            roots = self.index.get_roots().len(),
            unsupplied = stranded.len(),
            "hierarchy hydrated from physical graph"
        );
    }

    /// Sizes every non-consumer node from the consumers it feeds.
    pub fn initialize_capacities(&mut self) {
        CapacityPlanner::new(&self.rules).initialize_capacities(&mut self.graph, &self.index);
    }

    /// Assigns a consumer its service tier from its devices' average power.
    pub fn set_consumer_tier(&mut self, id: &str, total_avg_power: f64) -> Result<(), GridError> {
        let capacity = self.rules.consumer_capacity(total_avg_power);
        let node = self
            .graph
            .node_mut(id)
            .ok_or_else(|| GridError::NodeNotFound(id.to_string()))?;
        node.capacity = Some(capacity);
        Ok(())
    }

    /// Zeroes every load, ahead of re-deriving them from device draws.
    pub fn reset_loads(&mut self) {
        let ids: Vec<NodeId> = self.graph.nodes().into_iter().map(|n| n.id.clone()).collect();
        for id in ids {
            if let Some(node) = self.graph.node_mut(&id) {
                node.current_load = 0.0;
            }
        }
    }

    /// Pushes a consumer's device-power change through its supply chain.
    pub fn apply_load_change(&mut self, change: &LoadChange) {
        if self.graph.contains(&change.consumer) {
            LoadAggregator::propagate_load_delta(
                &mut self.graph,
                &self.index,
                &change.consumer,
                change.delta,
            );
        }
    }

    /// Registers `node` and `edges`, then connects the node to the best
    /// supplier within `placement_search_hops`.
    ///
    /// Returns the chosen supplier, or `None` when the node was left
    /// unsupplied (or is itself a generation plant).
    pub fn add_node_with_routing(
        &mut self,
        node: Node,
        edges: Vec<Edge>,
    ) -> Result<Option<NodeId>, GridError> {
        if self.graph.contains(&node.id) {
            return Err(GridError::DuplicateNode(node.id));
        }
        for edge in &edges {
            let other = edge.other_end(&node.id).ok_or_else(|| {
                GridError::InvalidRequest(format!(
                    "edge {} does not touch new node {}",
                    edge.id, node.id
                ))
            })?;
            if !self.graph.contains(other) {
                return Err(GridError::MissingEndpoint {
                    edge: edge.id.clone(),
                    node: other.to_string(),
                });
            }
        }

        let id = node.id.clone();
        let is_source = node.node_type.is_source();
        self.graph.add_node(node)?;
        for edge in edges {
            if let Err(err) = self.graph.add_edge(edge) {
                self.graph.remove_node(&id);
                return Err(err);
            }
        }

        if is_source {
            self.index.add_root(&id);
            info!(node_id = %id, "generation plant added as root");
            return Ok(None);
        }

        self.index.register(&id);
        self.unsupplied.insert(&id);

        let hops = self.settings.placement_search_hops;
        match self.best_supplier(&id, hops) {
            Some(candidate) => {
                self.attach(&id, &candidate.id);
                info!(node_id = %id, supplier = %candidate.id, ratio = candidate.ratio, "node connected");
                self.record(NetworkEvent::Connected {
                    node: id,
                    supplier: candidate.id.clone(),
                });
                Ok(Some(candidate.id))
            }
            None => {
                info!(node_id = %id, "no eligible supplier, node left unsupplied");
                self.record(NetworkEvent::PlacementFailed { node: id });
                Ok(None)
            }
        }
    }

    /// Detaches `id` from the hierarchy. Its children become unsupplied
    /// heads; its whole subtree load is withdrawn from the old ancestors.
    ///
    /// Without `remove_from_graph` the node keeps its place in the index,
    /// carrying only its own load: a plant stays a root, anything else
    /// becomes an unsupplied head.
    pub fn remove_node(&mut self, id: &str, remove_from_graph: bool) -> Result<(), GridError> {
        let subtree_load = self.graph.try_node(id)?.current_load;

        if let Some(parent) = self.index.get_parent(id).cloned() {
            LoadAggregator::propagate_load_delta(&mut self.graph, &self.index, &parent, -subtree_load);
        }
        let orphans = if remove_from_graph {
            self.index.remove_node(id)
        } else {
            self.index.detach(id);
            self.index.detach_children(id)
        };
        let orphaned_load: f64 = orphans
            .iter()
            .filter_map(|child| self.graph.node(child))
            .map(|child| child.current_load)
            .sum();
        for orphan in &orphans {
            self.mark_subtree_unsupplied(orphan);
        }

        if remove_from_graph {
            self.graph.remove_node(id);
            self.unsupplied.remove(id);
        } else {
            if let Some(node) = self.graph.node_mut(id) {
                node.current_load = (subtree_load - orphaned_load).max(0.0);
            }
            if !self.index.is_root(id) {
                self.unsupplied.insert(id);
            }
        }

        info!(
            node_id = %id,
            orphaned = orphans.len(),
            from_graph = remove_from_graph,
            "node removed from hierarchy"
        );
        self.record(NetworkEvent::NodeRemoved {
            node: id.to_string(),
            orphaned: orphans.len(),
            from_graph: remove_from_graph,
        });
        Ok(())
    }

    /// Hangs the parentless subtree headed by `id` under `parent`.
    fn attach(&mut self, id: &str, parent: &str) {
        self.index.set_parent(id, parent);
        let load = self.graph.node(id).map(|n| n.current_load).unwrap_or(0.0);
        LoadAggregator::propagate_load_delta(&mut self.graph, &self.index, parent, load);
        self.refresh_supply(id);
    }

    /// Moves the subtree headed by `id` under `new_parent`, carrying its load
    /// from the old ancestor chain to the new one.
    fn reattach(&mut self, id: &str, new_parent: &str) -> Option<NodeId> {
        let load = self.graph.node(id).map(|n| n.current_load).unwrap_or(0.0);
        let old_parent = self.index.detach(id);
        if let Some(old) = &old_parent {
            LoadAggregator::propagate_load_delta(&mut self.graph, &self.index, old, -load);
        }
        self.attach(id, new_parent);
        debug!(node_id = %id, from = ?old_parent, to = %new_parent, load, "subtree moved");
        old_parent
    }

    /// Detaches the subtree headed by `id` and marks it unsupplied.
    fn shed(&mut self, id: &str) -> Option<NodeId> {
        let load = self.graph.node(id).map(|n| n.current_load).unwrap_or(0.0);
        let parent = self.index.detach(id)?;
        LoadAggregator::propagate_load_delta(&mut self.graph, &self.index, &parent, -load);
        self.mark_subtree_unsupplied(id);
        Some(parent)
    }

    fn refresh_supply(&mut self, id: &str) {
        if self.index.is_connected_to_root(id) {
            for member in self.index.subtree(id) {
                self.unsupplied.remove(&member);
            }
        } else {
            self.mark_subtree_unsupplied(id);
        }
    }

    fn mark_subtree_unsupplied(&mut self, id: &str) {
        for member in self.index.subtree(id) {
            self.unsupplied.insert(&member);
        }
    }
}
