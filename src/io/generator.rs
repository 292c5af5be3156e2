//! Seeded synthetic topologies.
//!
//! Plants are scattered over a square area. Transmission substations are
//! placed around the plants in turn and chained into a backbone. Every
//! cluster hangs off one transmission substation and holds a few distribution
//! substations (neighbours tied by MV segments) each feeding a handful of
//! consumers.

use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::{Validate, ValidationError};

use crate::domain::{Edge, EdgeType, Node, NodeType};
use crate::error::LoadError;
use crate::network::PhysicalGraph;

const PLANT_KV: f64 = 230.0;
const TRANSMISSION_KV: f64 = 138.0;
const DISTRIBUTION_KV: f64 = 13.8;
const CONSUMER_KV: f64 = 0.127;

/// Share of a segment limit used as placement radius, so that segments
/// between a node and its anchor stay within the limit.
const PLACEMENT_REACH: f64 = 0.8;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_consumer_bounds"))]
pub struct GeneratorConfig {
    pub seed: u64,
    #[validate(range(min = 1))]
    pub num_clusters: usize,
    #[validate(range(min = 1))]
    pub num_generation_plants: usize,
    #[validate(range(min = 1))]
    pub num_transmission_substations: usize,
    #[validate(range(min = 1))]
    pub distribution_per_cluster: usize,
    pub min_consumers_per_substation: usize,
    pub max_consumers_per_substation: usize,
    #[validate(range(min = 1.0))]
    pub max_transmission_segment_length: f64,
    #[validate(range(min = 1.0))]
    pub max_mv_segment_length: f64,
    #[validate(range(min = 1.0))]
    pub max_lv_segment_length: f64,
    #[validate(range(min = 10.0))]
    pub area_size: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_clusters: 4,
            num_generation_plants: 2,
            num_transmission_substations: 3,
            distribution_per_cluster: 3,
            min_consumers_per_substation: 3,
            max_consumers_per_substation: 8,
            max_transmission_segment_length: 400.0,
            max_mv_segment_length: 60.0,
            max_lv_segment_length: 15.0,
            area_size: 1000.0,
        }
    }
}

fn validate_consumer_bounds(cfg: &GeneratorConfig) -> Result<(), ValidationError> {
    if cfg.min_consumers_per_substation > cfg.max_consumers_per_substation {
        return Err(ValidationError::new("min_consumers_exceeds_max"));
    }
    Ok(())
}

struct Builder<'a> {
    cfg: &'a GeneratorConfig,
    rng: StdRng,
    graph: PhysicalGraph,
    next_edge: usize,
}

impl Builder<'_> {
    /// A point within `radius` of `(x, y)`, kept inside the area.
    fn near(&mut self, x: f64, y: f64, radius: f64) -> (f64, f64) {
        let angle = self.rng.gen_range(0.0..TAU);
        let distance = self.rng.gen_range(0.0..=radius);
        let area = self.cfg.area_size;
        (
            (x + distance * angle.cos()).clamp(0.0, area),
            (y + distance * angle.sin()).clamp(0.0, area),
        )
    }

    fn place(&mut self, node: Node) -> Result<Node, LoadError> {
        self.graph.add_node(node.clone())?;
        Ok(node)
    }

    fn connect(&mut self, edge_type: EdgeType, a: &Node, b: &Node) -> Result<(), LoadError> {
        let id = format!("E_{}", self.next_edge);
        self.next_edge += 1;
        let length = a.distance_to(b).max(1.0);
        self.graph
            .add_edge(Edge::new(id, edge_type, a.id.clone(), b.id.clone(), length))?;
        Ok(())
    }
}

/// Synthesizes a physical graph. Same configuration, same graph.
pub fn generate(cfg: &GeneratorConfig) -> Result<PhysicalGraph, LoadError> {
    cfg.validate()?;
    let mut b = Builder {
        cfg,
        rng: StdRng::seed_from_u64(cfg.seed),
        graph: PhysicalGraph::new(),
        next_edge: 0,
    };

    let mut plants = Vec::with_capacity(cfg.num_generation_plants);
    for i in 0..cfg.num_generation_plants {
        let x = b.rng.gen_range(0.0..=cfg.area_size);
        let y = b.rng.gen_range(0.0..=cfg.area_size);
        let plant = Node::new(format!("G_{i}"), NodeType::GenerationPlant)
            .with_position(x, y)
            .with_voltage(PLANT_KV);
        plants.push(b.place(plant)?);
    }

    let transmission_reach = cfg.max_transmission_segment_length * PLACEMENT_REACH;
    let mut substations: Vec<Node> = Vec::with_capacity(cfg.num_transmission_substations);
    for i in 0..cfg.num_transmission_substations {
        let plant = &plants[i % plants.len()];
        let (x, y) = b.near(plant.position_x, plant.position_y, transmission_reach);
        let ts = b.place(
            Node::new(format!("TS_{i}"), NodeType::TransmissionSubstation)
                .with_position(x, y)
                .with_voltage(TRANSMISSION_KV),
        )?;
        b.connect(EdgeType::TransmissionSegment, plant, &ts)?;
        if let Some(previous) = substations.last() {
            b.connect(EdgeType::TransmissionSegment, previous, &ts)?;
        }
        substations.push(ts);
    }

    let mv_reach = cfg.max_mv_segment_length * PLACEMENT_REACH;
    let lv_reach = cfg.max_lv_segment_length * PLACEMENT_REACH;
    let mut ds_count = 0;
    let mut consumer_count = 0;
    for k in 0..cfg.num_clusters {
        let cluster = format!("cluster_{k}");
        let ts = substations[k % substations.len()].clone();
        let mut previous: Option<Node> = None;
        for _ in 0..cfg.distribution_per_cluster {
            let (x, y) = b.near(ts.position_x, ts.position_y, mv_reach);
            let ds = b.place(
                Node::new(format!("DS_{ds_count}"), NodeType::DistributionSubstation)
                    .with_position(x, y)
                    .with_voltage(DISTRIBUTION_KV)
                    .with_cluster(cluster.clone()),
            )?;
            ds_count += 1;
            b.connect(EdgeType::MvSegment, &ts, &ds)?;
            if let Some(prev) = &previous {
                b.connect(EdgeType::MvSegment, prev, &ds)?;
            }

            let consumers = b
                .rng
                .gen_range(cfg.min_consumers_per_substation..=cfg.max_consumers_per_substation);
            for _ in 0..consumers {
                let (x, y) = b.near(ds.position_x, ds.position_y, lv_reach);
                let consumer = b.place(
                    Node::new(format!("C_{consumer_count}"), NodeType::ConsumerPoint)
                        .with_position(x, y)
                        .with_voltage(CONSUMER_KV)
                        .with_cluster(cluster.clone()),
                )?;
                consumer_count += 1;
                b.connect(EdgeType::LvDistributionSegment, &ds, &consumer)?;
            }
            previous = Some(ds);
        }
    }

    info!(
        seed = cfg.seed,
        nodes = b.graph.node_count(),
        edges = b.graph.edge_count(),
        consumers = consumer_count,
        "topology generated"
    );
    Ok(b.graph)
}
