use super::{HierarchyIndex, PhysicalGraph};

/// Pushes load changes up the supply chain.
pub struct LoadAggregator;

impl LoadAggregator {
    /// Adds `delta` to `current_load` at `id` and at every ancestor.
    ///
    /// Stops at the topmost parentless node. Loads are clamped at zero to
    /// absorb floating-point residue from long chains of deltas.
    pub fn propagate_load_delta(
        graph: &mut PhysicalGraph,
        index: &HierarchyIndex,
        id: &str,
        delta: f64,
    ) {
        if delta == 0.0 || !delta.is_finite() {
            return;
        }
        let mut current = Some(id.to_string());
        let mut remaining_hops = index.len().max(1);
        while let Some(node_id) = current {
            if let Some(node) = graph.node_mut(&node_id) {
                node.current_load = (node.current_load + delta).max(0.0);
            }
            if remaining_hops == 0 {
                break;
            }
            remaining_hops -= 1;
            current = index.get_parent(&node_id).cloned();
        }
    }
}
