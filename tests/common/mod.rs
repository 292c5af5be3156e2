#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use power_grid_router::backend::GridBackend;
use power_grid_router::config::Config;
use power_grid_router::io::{generate, GeneratorConfig};
use power_grid_router::simulation::ManualClock;

pub fn small_generator(seed: u64) -> GeneratorConfig {
    GeneratorConfig {
        seed,
        num_clusters: 2,
        num_generation_plants: 1,
        num_transmission_substations: 2,
        distribution_per_cluster: 2,
        min_consumers_per_substation: 2,
        max_consumers_per_substation: 4,
        ..GeneratorConfig::default()
    }
}

pub fn backend_with(generator: &GeneratorConfig) -> (GridBackend, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0.0));
    let graph = generate(generator).expect("generator config is valid");
    let backend = GridBackend::from_graph(graph, &Config::default(), clock.clone());
    (backend, clock)
}

/// Checks the structural and load invariants of the whole backend:
/// the hierarchy is a forest visited once in preorder, plants are the only
/// roots, unsupplied membership matches reachability, and every load equals
/// the node's own draw plus its children's loads.
pub fn assert_consistent(backend: &GridBackend) {
    let routing = backend.routing();
    let index = routing.index();
    let graph = routing.graph();

    let order = index.iter_preorder();
    assert_eq!(order.len(), index.len(), "preorder misses nodes");
    assert_eq!(order.len(), graph.node_count(), "hierarchy and graph disagree");

    let mut seen = HashSet::new();
    for id in &order {
        assert!(seen.insert(id.clone()), "{id} visited twice");
        if let Some(parent) = index.get_parent(id) {
            assert!(seen.contains(parent), "{id} visited before its parent {parent}");
        }
    }

    for root in index.get_roots() {
        assert!(graph.node(root).unwrap().node_type.is_source(), "{root} is not a plant");
    }

    for id in &order {
        let connected = index.is_connected_to_root(id);
        assert_eq!(
            routing.unsupplied().contains(id),
            !connected,
            "unsupplied membership of {id}"
        );
    }

    for id in &order {
        let node = graph.node(id).unwrap();
        let own = if node.node_type.is_consumer() {
            backend.simulator().current_power_of(id)
        } else {
            0.0
        };
        let children: f64 = index
            .get_children(id)
            .iter()
            .map(|child| graph.node(child).unwrap().current_load)
            .sum();
        assert!(
            (node.current_load - (own + children)).abs() < 1e-6,
            "load of {id} is {} but own {own} + children {children}",
            node.current_load
        );
        assert!(node.current_load >= 0.0);
    }
}
