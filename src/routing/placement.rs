//! Supplier search and re-parenting.

use std::collections::{HashSet, VecDeque};

use ordered_float::OrderedFloat;
use tracing::{debug, info};

use super::RoutingService;
use crate::domain::{NetworkEvent, Node, NodeId, NodeType};
use crate::error::GridError;

/// Ratios closer than this are considered equal when deciding whether a
/// move is an improvement.
const RATIO_EPSILON: f64 = 1e-9;

/// An eligible supplier for a node, with its ranking inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: NodeId,
    /// Supplier load ratio once the node is attached (0 when uncapacitated).
    pub ratio: f64,
    /// Sum of edge lengths along the discovery path.
    pub path_length: f64,
}

impl Candidate {
    fn rank_key(&self) -> (OrderedFloat<f64>, OrderedFloat<f64>, &str) {
        (
            OrderedFloat(self.ratio),
            OrderedFloat(self.path_length),
            self.id.as_str(),
        )
    }
}

impl RoutingService {
    /// Eligible suppliers for `id` within `max_hops` physical hops.
    pub fn candidates(&self, id: &str, max_hops: usize) -> Vec<Candidate> {
        let Some(node) = self.graph.node(id) else {
            return Vec::new();
        };
        let node_type = node.node_type;
        let load = node.current_load;

        let mut out = Vec::new();
        let mut seen: HashSet<&str> = HashSet::from([id]);
        let mut queue: VecDeque<(&str, usize, f64)> = VecDeque::from([(id, 0, 0.0)]);
        while let Some((current, hops, distance)) = queue.pop_front() {
            if hops >= max_hops {
                continue;
            }
            for (neighbor, edge) in self.graph.neighbors(current) {
                if !seen.insert(neighbor.id.as_str()) {
                    continue;
                }
                let path_length = distance + edge.length;
                if let Some(candidate) = self.evaluate(id, node_type, load, neighbor, path_length) {
                    out.push(candidate);
                }
                queue.push_back((neighbor.id.as_str(), hops + 1, path_length));
            }
        }
        out
    }

    /// Checks whether `supplier` may take the subtree headed by `id`.
    fn evaluate(
        &self,
        id: &str,
        node_type: NodeType,
        load: f64,
        supplier: &Node,
        path_length: f64,
    ) -> Option<Candidate> {
        if !supplier.node_type.can_supply(node_type) {
            return None;
        }
        if !self.index.is_connected_to_root(&supplier.id) {
            return None;
        }
        if self.index.is_descendant(&supplier.id, id) {
            return None;
        }
        // An ancestor already carries this subtree's load.
        let carried = if self.index.is_descendant(id, &supplier.id) {
            load
        } else {
            0.0
        };
        let base = (supplier.current_load - carried).max(0.0);
        let ratio = match supplier.capacity {
            None => 0.0,
            Some(capacity) => {
                if capacity - base + RATIO_EPSILON < load {
                    return None;
                }
                if capacity > 0.0 {
                    (base + load) / capacity
                } else {
                    0.0
                }
            }
        };
        Some(Candidate {
            id: supplier.id.clone(),
            ratio,
            path_length,
        })
    }

    /// Best-ranked eligible supplier: lowest post-attachment ratio, then
    /// shortest path, then id.
    pub fn best_supplier(&self, id: &str, max_hops: usize) -> Option<Candidate> {
        self.candidates(id, max_hops)
            .into_iter()
            .min_by(|a, b| a.rank_key().cmp(&b.rank_key()))
    }

    /// Looks for a better supplier among the node's direct neighbours and
    /// switches to it. Returns the new supplier when a switch happened.
    pub fn change_parent_with_routing(&mut self, id: &str) -> Result<Option<NodeId>, GridError> {
        let node = self.graph.try_node(id)?;
        if node.node_type.is_source() {
            return Err(GridError::RootReparent(id.to_string()));
        }
        let (node_type, node_load) = (node.node_type, node.current_load);

        let current = self.index.get_parent(id).cloned();
        // The current supplier may sit beyond the neighbourhood searched
        // below; only a supplied parent that can still carry the node counts.
        let current_ratio = current
            .as_deref()
            .and_then(|parent| self.graph.node(parent))
            .and_then(|parent| self.evaluate(id, node_type, node_load, parent, 0.0))
            .map(|c| c.ratio);
        let Some(best) = self
            .candidates(id, 1)
            .into_iter()
            .min_by(|a, b| a.rank_key().cmp(&b.rank_key()))
        else {
            debug!(node_id = %id, "no alternative supplier in reach");
            return Ok(None);
        };

        let improves = match current_ratio {
            None => true,
            Some(ratio) => best.ratio + RATIO_EPSILON < ratio,
        };
        if current.as_deref() == Some(best.id.as_str()) || !improves {
            return Ok(None);
        }

        let from = self.reattach(id, &best.id);
        info!(node_id = %id, from = ?from, to = %best.id, ratio = best.ratio, "supplier switched");
        self.record(NetworkEvent::SupplierChanged {
            node: id.to_string(),
            from,
            to: best.id.clone(),
        });
        Ok(Some(best.id))
    }

    /// Re-parents `id` under `parent` regardless of ranking.
    ///
    /// The parent must be physically adjacent and outside the node's own
    /// subtree. Capacity is not a precondition: an overloaded parent is
    /// repaired by shedding right after the move.
    pub fn force_change_parent(&mut self, id: &str, parent: &str) -> Result<(), GridError> {
        let node = self.graph.try_node(id)?;
        if node.node_type.is_source() {
            return Err(GridError::RootReparent(id.to_string()));
        }
        self.graph.try_node(parent)?;
        if self.index.is_descendant(parent, id) {
            return Err(GridError::CycleDetected {
                node: id.to_string(),
                parent: parent.to_string(),
            });
        }
        if !self.graph.are_adjacent(id, parent) {
            return Err(GridError::NotAdjacent {
                node: id.to_string(),
                parent: parent.to_string(),
            });
        }
        if self.index.get_parent(id).map(String::as_str) == Some(parent) {
            return Ok(());
        }

        let from = self.reattach(id, parent);
        info!(node_id = %id, from = ?from, to = %parent, "supplier forced");
        self.record(NetworkEvent::SupplierChanged {
            node: id.to_string(),
            from,
            to: parent.to_string(),
        });
        self.handle_overload(parent);
        Ok(())
    }

    /// Tries to reconnect every unsupplied node to a direct neighbour, in
    /// ascending id order, until a full pass reconnects nothing.
    ///
    /// Returns the number of nodes reconnected.
    pub fn retry_unsupplied_routing(&mut self) -> usize {
        let mut reconnected = 0;
        let max_passes = self.index.len() + 1;
        for _ in 0..max_passes {
            let mut progressed = false;
            for id in self.unsupplied.sorted() {
                if !self.unsupplied.contains(&id) || self.index.is_root(&id) {
                    continue;
                }
                let Some(candidate) = self.best_supplier(&id, 1) else {
                    continue;
                };
                self.reattach(&id, &candidate.id);
                info!(node_id = %id, supplier = %candidate.id, "unsupplied node reconnected");
                self.record(NetworkEvent::Reconnected {
                    node: id,
                    supplier: candidate.id,
                });
                reconnected += 1;
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        reconnected
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{load, parent, sample_service};
    use super::*;
    use crate::domain::{Edge, EdgeType};

    #[test]
    fn test_candidates_respect_type_and_subtree() {
        let service = sample_service(0.5);
        let ids: Vec<String> = service
            .candidates("DS2", 1)
            .into_iter()
            .map(|c| c.id)
            .collect();
        // TS and DS1 may feed a distribution substation; C2/C3 may not.
        assert_eq!(ids, vec!["TS".to_string(), "DS1".to_string()]);
    }

    #[test]
    fn test_descendants_are_never_offered() {
        let mut service = sample_service(0.5);
        service.force_change_parent("DS2", "DS1").unwrap();
        let ids: Vec<String> = service
            .candidates("DS1", 3)
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert!(!ids.contains(&"DS2".to_string()));
        assert!(ids.contains(&"TS".to_string()));
    }

    #[test]
    fn test_candidate_needs_spare_capacity() {
        let service = sample_service(1.2);
        // DS2 sits at 1.2 of 1.5, so it cannot take C2 (1.2) as well.
        assert!(service.candidates("C2", 1).iter().all(|c| c.id != "DS2"));
        // DS1 already carries C2, so keeping it is feasible.
        assert!(service.candidates("C2", 1).iter().any(|c| c.id == "DS1"));
    }

    #[test]
    fn test_change_parent_moves_to_less_loaded_supplier() {
        let mut service = sample_service(0.2);
        // DS1 at 0.4/3.0 with C2; DS2 would be at 0.4/1.5.
        assert_eq!(service.change_parent_with_routing("C2").unwrap(), None);

        service.set_node_capacity("DS2", 10.0).unwrap();
        // DS2 now at 0.4/10 once C2 joins, well below DS1's 0.4/3.
        assert_eq!(
            service.change_parent_with_routing("C2").unwrap().as_deref(),
            Some("DS2")
        );
        assert_eq!(parent(&service, "C2").as_deref(), Some("DS2"));
        assert!((load(&service, "DS1") - 0.2).abs() < 1e-9);
        assert!((load(&service, "DS2") - 0.4).abs() < 1e-9);
        assert!((load(&service, "G") - 0.6).abs() < 1e-9);

        // A second call finds nothing better.
        assert_eq!(service.change_parent_with_routing("C2").unwrap(), None);
    }

    #[test]
    fn test_change_parent_keeps_distant_better_supplier() {
        let mut service = sample_service(0.5);
        service.set_node_capacity("DS2", 1.0).unwrap();
        let edges = vec![
            Edge::new("EN1", EdgeType::LvDistributionSegment, "N", "DS2", 1.0),
            Edge::new("EN2", EdgeType::LvDistributionSegment, "N", "C1", 1.0),
        ];
        // DS1 (1.0/3.0) lies two hops out and beats the adjacent DS2 (0.5/1.0).
        let chosen = service
            .add_node_with_routing(Node::new("N", NodeType::ConsumerPoint), edges)
            .unwrap();
        assert_eq!(chosen.as_deref(), Some("DS1"));

        assert_eq!(service.change_parent_with_routing("N").unwrap(), None);
        assert_eq!(parent(&service, "N").as_deref(), Some("DS1"));
    }

    #[test]
    fn test_change_parent_rejects_plants() {
        let mut service = sample_service(0.0);
        assert_eq!(
            service.change_parent_with_routing("G"),
            Err(GridError::RootReparent("G".into()))
        );
    }

    #[test]
    fn test_force_change_parent_rejects_cycles() {
        let mut service = sample_service(0.1);
        // DS1 is adjacent to C1, but C1 hangs below DS1.
        assert_eq!(
            service.force_change_parent("DS1", "C1"),
            Err(GridError::CycleDetected {
                node: "DS1".into(),
                parent: "C1".into()
            })
        );
        assert!(service
            .force_change_parent("DS1", "DS1")
            .unwrap_err()
            .is_structural());
        assert_eq!(parent(&service, "DS1").as_deref(), Some("TS"));
    }

    #[test]
    fn test_force_change_parent_requires_adjacency() {
        let mut service = sample_service(0.1);
        assert!(matches!(
            service.force_change_parent("C1", "DS2"),
            Err(GridError::NotAdjacent { .. })
        ));
        assert!(matches!(
            service.force_change_parent("C1", "nowhere"),
            Err(GridError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_forced_overload_is_repaired() {
        let mut service = sample_service(1.0);
        // DS2 (1.5) takes C2 (1.0) on top of C3 (1.0): 2.0 > 1.5.
        service.force_change_parent("C2", "DS2").unwrap();

        let ds2 = service.graph().node("DS2").unwrap();
        assert!(!ds2.is_overloaded());
        let shed: Vec<&str> = ["C2", "C3"]
            .into_iter()
            .filter(|id| service.is_unsupplied(id))
            .collect();
        assert_eq!(shed.len(), 1);
        assert!((load(&service, "G") - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_retry_reconnects_and_is_idempotent() {
        let mut service = sample_service(0.5);
        service.remove_node("DS1", true).unwrap();
        assert!(service.is_unsupplied("C1"));
        assert!(service.is_unsupplied("C2"));

        // C2 has an LV tie to DS2, which still has room.
        let reconnected = service.retry_unsupplied_routing();
        assert_eq!(reconnected, 1);
        assert_eq!(parent(&service, "C2").as_deref(), Some("DS2"));
        // C1 only touched DS1.
        assert!(service.is_unsupplied("C1"));

        let before = service.unsupplied().clone();
        assert_eq!(service.retry_unsupplied_routing(), 0);
        assert_eq!(service.unsupplied(), &before);
    }
}
