//! Capacity changes, fault injection and load shedding.

use tracing::{info, warn};

use super::RoutingService;
use crate::domain::{NetworkEvent, NodeId};
use crate::error::GridError;

impl RoutingService {
    /// Overwrites a node's capacity and sheds load if it no longer fits.
    pub fn set_node_capacity(&mut self, id: &str, capacity: f64) -> Result<(), GridError> {
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(GridError::InvalidRequest(format!(
                "capacity must be a finite, non-negative number (got {capacity})"
            )));
        }
        let node = self
            .graph
            .node_mut(id)
            .ok_or_else(|| GridError::NodeNotFound(id.to_string()))?;
        let old = node.capacity.replace(capacity);
        info!(node_id = %id, ?old, new = capacity, "capacity changed");
        self.record(NetworkEvent::CapacityChanged {
            node: id.to_string(),
            old,
            new: capacity,
        });
        self.handle_overload(id);
        Ok(())
    }

    /// Simulates a degraded asset: capacity shrinks by `pct` (clamped to
    /// `[0, 1]`) but never below the configured floor. An uncapacitated node
    /// degrades from its current load.
    pub fn force_overload(&mut self, id: &str, pct: f64) -> Result<(), GridError> {
        let floor = self.rules.degraded_floor_kw;
        let pct = if pct.is_finite() { pct.clamp(0.0, 1.0) } else { 0.0 };
        let node = self
            .graph
            .node_mut(id)
            .ok_or_else(|| GridError::NodeNotFound(id.to_string()))?;
        let base = node.capacity.unwrap_or(node.current_load);
        let degraded = (base * (1.0 - pct)).max(floor);
        node.capacity = Some(degraded);
        warn!(node_id = %id, pct, capacity = degraded, "fault injected");
        self.record(NetworkEvent::CapacityDegraded {
            node: id.to_string(),
            pct,
            capacity: degraded,
        });
        self.handle_overload(id);
        Ok(())
    }

    /// Sheds child subtrees of an overloaded node until it fits its capacity
    /// or has nothing left to shed. No-op when the node is within capacity.
    ///
    /// Each round prefers the lightest child whose removal alone restores the
    /// node; failing that, the heaviest child goes.
    pub fn handle_overload(&mut self, id: &str) {
        let (load, capacity) = match self.graph.node(id) {
            Some(node) if node.is_overloaded() => {
                (node.current_load, node.capacity.unwrap_or_default())
            }
            _ => return,
        };
        warn!(node_id = %id, load, capacity, "node overloaded");
        self.record(NetworkEvent::OverloadAlert {
            node: id.to_string(),
            load,
            capacity,
        });

        while self.graph.node(id).is_some_and(|n| n.is_overloaded()) {
            let Some(victim) = self.pick_shed_victim(id, capacity) else {
                break;
            };
            let shed_load = self.graph.node(&victim).map_or(0.0, |n| n.current_load);
            if self.shed(&victim).is_none() {
                break;
            }
            info!(node_id = %victim, parent = %id, load = shed_load, "load shed");
            self.record(NetworkEvent::LoadShed {
                node: victim,
                parent: id.to_string(),
                load: shed_load,
            });
        }

        let Some((ratio, still_overloaded)) = self
            .graph
            .node(id)
            .map(|n| (n.load_ratio().unwrap_or(0.0), n.is_overloaded()))
        else {
            return;
        };
        if still_overloaded {
            warn!(node_id = %id, ratio, "overload persists after shedding");
            self.record(NetworkEvent::OverloadPersists {
                node: id.to_string(),
                ratio,
            });
        } else {
            self.record(NetworkEvent::OverloadResolved {
                node: id.to_string(),
                ratio,
            });
        }
    }

    fn pick_shed_victim(&self, id: &str, capacity: f64) -> Option<NodeId> {
        let load = self.graph.node(id)?.current_load;
        let children: Vec<(&NodeId, f64)> = self
            .index
            .get_children(id)
            .iter()
            .filter_map(|child| Some((child, self.graph.node(child)?.current_load)))
            .filter(|(_, child_load)| *child_load > 0.0)
            .collect();

        let sufficient = children
            .iter()
            .filter(|(_, child_load)| load - child_load <= capacity)
            .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        let chosen = sufficient.or_else(|| {
            children
                .iter()
                .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        });
        chosen.map(|(child, _)| (*child).clone())
    }
}
