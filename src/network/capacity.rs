//! One-shot capacity sizing.
//!
//! Consumers are sized from the average power of their devices (a single- or
//! three-phase service tier). Every other node is sized from the number of
//! distinct consumers it ultimately feeds, which makes capacity
//! non-decreasing towards the root.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::debug;

use super::{HierarchyIndex, PhysicalGraph};
use crate::domain::NodeId;

/// Tunable sizing constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CapacityRules {
    /// Capacity granted per consumer fed by a non-consumer node.
    pub per_consumer_kw: f64,
    /// Lower bound for any non-consumer node, even with an empty subtree.
    pub min_capacity_kw: f64,
    /// Consumer tier when the device average is at or below this value.
    pub single_phase_kw: f64,
    /// Consumer tier above the single-phase threshold.
    pub three_phase_kw: f64,
    /// Smallest capacity a degraded asset may be reduced to.
    pub degraded_floor_kw: f64,
}

impl Default for CapacityRules {
    fn default() -> Self {
        Self {
            per_consumer_kw: 1.5,
            min_capacity_kw: 1.0,
            single_phase_kw: 13.0,
            three_phase_kw: 25.0,
            degraded_floor_kw: 0.1,
        }
    }
}

impl CapacityRules {
    /// Service tier of a consumer whose devices average `total_avg_power`.
    pub fn consumer_capacity(&self, total_avg_power: f64) -> f64 {
        if total_avg_power <= self.single_phase_kw {
            self.single_phase_kw
        } else {
            self.three_phase_kw
        }
    }

    pub fn substation_capacity(&self, consumers_in_subtree: usize) -> f64 {
        (consumers_in_subtree as f64 * self.per_consumer_kw).max(self.min_capacity_kw)
    }
}

pub struct CapacityPlanner<'a> {
    rules: &'a CapacityRules,
}

impl<'a> CapacityPlanner<'a> {
    pub fn new(rules: &'a CapacityRules) -> Self {
        Self { rules }
    }

    /// Sizes every non-consumer node from its subtree, bottom-up.
    ///
    /// Consumer capacities are left untouched; they are assigned when the
    /// consumer's devices are seeded.
    pub fn initialize_capacities(&self, graph: &mut PhysicalGraph, index: &HierarchyIndex) {
        let order = index.iter_preorder();
        let mut consumers: HashMap<NodeId, HashSet<NodeId>> = HashMap::with_capacity(order.len());

        for id in order.iter().rev() {
            let Some(node) = graph.node(id) else {
                continue;
            };
            let is_consumer = node.node_type.is_consumer();

            let mut fed: HashSet<NodeId> = HashSet::new();
            for child in index.get_children(id) {
                if let Some(child_set) = consumers.get(child) {
                    fed.extend(child_set.iter().cloned());
                }
            }
            if is_consumer {
                fed.insert(id.clone());
            } else if let Some(node) = graph.node_mut(id) {
                let capacity = self.rules.substation_capacity(fed.len());
                debug!(node_id = %id, consumers = fed.len(), capacity, "sized node");
                node.capacity = Some(capacity);
            }
            consumers.insert(id.clone(), fed);
        }
    }
}
