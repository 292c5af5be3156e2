//! CSV persistence of the physical graph.
//!
//! Two files with headers: nodes
//! (`id,node_type,position_x,position_y,nominal_voltage,capacity,current_load,cluster_id`)
//! and edges (`id,edge_type,from_node_id,to_node_id,length`). Empty
//! `capacity`/`cluster_id` cells read as null.

use std::fs::{self, File};
use std::path::Path;

use csv::{ReaderBuilder, Writer};
use serde::de::DeserializeOwned;
use tracing::info;

use super::generator::{generate, GeneratorConfig};
use crate::config::NetworkConfig;
use crate::domain::{Edge, Node};
use crate::error::LoadError;
use crate::network::PhysicalGraph;

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, LoadError> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: display.clone(),
        source,
    })?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);
    let mut out = Vec::new();
    for result in rdr.deserialize() {
        let record: T = result.map_err(|source| LoadError::Csv {
            path: display.clone(),
            source,
        })?;
        out.push(record);
    }
    Ok(out)
}

pub fn read_nodes(path: &Path) -> Result<Vec<Node>, LoadError> {
    read_records(path)
}

pub fn read_edges(path: &Path) -> Result<Vec<Edge>, LoadError> {
    read_records(path)
}

/// Loads both files into a graph, rejecting duplicate ids and dangling
/// edge endpoints.
pub fn load_network(nodes_path: &Path, edges_path: &Path) -> Result<PhysicalGraph, LoadError> {
    let nodes = read_nodes(nodes_path)?;
    let edges = read_edges(edges_path)?;
    let mut graph = PhysicalGraph::new();
    for node in nodes {
        graph.add_node(node)?;
    }
    for edge in edges {
        graph.add_edge(edge)?;
    }
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        path = %nodes_path.display(),
        "network loaded"
    );
    Ok(graph)
}

fn write_records<'a, T: serde::Serialize + 'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a T>,
) -> Result<(), LoadError> {
    let display = path.display().to_string();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| LoadError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let csv_err = |source| LoadError::Csv {
        path: display.clone(),
        source,
    };
    let mut writer = Writer::from_path(path).map_err(csv_err)?;
    for record in records {
        writer.serialize(record).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| LoadError::Io {
        path: display.clone(),
        source,
    })
}

/// Writes the graph in registration order.
pub fn export_network(
    graph: &PhysicalGraph,
    nodes_path: &Path,
    edges_path: &Path,
) -> Result<(), LoadError> {
    write_records(nodes_path, graph.nodes())?;
    write_records(edges_path, graph.edges())?;
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        path = %nodes_path.display(),
        "network exported"
    );
    Ok(())
}

/// Loads the configured files, synthesizing and exporting them first when
/// they are absent and a generator is configured.
pub fn load_or_generate(
    network: &NetworkConfig,
    generator: Option<&GeneratorConfig>,
) -> Result<PhysicalGraph, LoadError> {
    let present = network.nodes_path.exists() && network.edges_path.exists();
    if present {
        return load_network(&network.nodes_path, &network.edges_path);
    }
    match generator.filter(|_| network.generate_if_missing) {
        Some(generator) => {
            info!(seed = generator.seed, "network files missing, generating topology");
            let graph = generate(generator)?;
            export_network(&graph, &network.nodes_path, &network.edges_path)?;
            Ok(graph)
        }
        None => Err(LoadError::MissingSource {
            nodes: network.nodes_path.display().to_string(),
            edges: network.edges_path.display().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EdgeType, NodeType};
    use std::io::Write;
    use tempfile::TempDir;

    fn network_in(dir: &TempDir) -> NetworkConfig {
        NetworkConfig {
            nodes_path: dir.path().join("nodes.csv"),
            edges_path: dir.path().join("edges.csv"),
            generate_if_missing: true,
        }
    }

    fn write(path: &Path, contents: &str) {
        let mut file = File::create(path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn test_reads_hand_written_files() {
        let dir = TempDir::new().unwrap();
        let cfg = network_in(&dir);
        write(
            &cfg.nodes_path,
            "id,node_type,position_x,position_y,nominal_voltage,capacity,current_load,cluster_id\n\
             G_0,GENERATION_PLANT,0,0,230,,0,\n\
             DS_0,DISTRIBUTION_SUBSTATION,5,5,13.8,4.5,1.25,cluster_0\n",
        );
        write(
            &cfg.edges_path,
            "id,edge_type,from_node_id,to_node_id,length\nE_0,MV_SEGMENT,G_0,DS_0,7.07\n",
        );

        let graph = load_network(&cfg.nodes_path, &cfg.edges_path).unwrap();
        let plant = graph.node("G_0").unwrap();
        assert_eq!(plant.node_type, NodeType::GenerationPlant);
        assert_eq!(plant.capacity, None);
        assert_eq!(plant.cluster_id, None);
        let ds = graph.node("DS_0").unwrap();
        assert_eq!(ds.capacity, Some(4.5));
        assert_eq!(ds.cluster_id.as_deref(), Some("cluster_0"));
        assert_eq!(graph.edges()[0].edge_type, EdgeType::MvSegment);
    }

    #[test]
    fn test_export_then_load_preserves_graph() {
        let dir = TempDir::new().unwrap();
        let cfg = network_in(&dir);
        let graph = generate(&GeneratorConfig::default()).unwrap();
        export_network(&graph, &cfg.nodes_path, &cfg.edges_path).unwrap();

        let loaded = load_network(&cfg.nodes_path, &cfg.edges_path).unwrap();
        assert_eq!(loaded.node_count(), graph.node_count());
        assert_eq!(loaded.edge_count(), graph.edge_count());
        assert_eq!(loaded.nodes(), graph.nodes());
    }

    #[test]
    fn test_malformed_rows_fail_fast() {
        let dir = TempDir::new().unwrap();
        let cfg = network_in(&dir);
        write(
            &cfg.nodes_path,
            "id,node_type,position_x,position_y,nominal_voltage,capacity,current_load,cluster_id\n\
             X,POWER_STATION,0,0,1,,0,\n",
        );
        write(&cfg.edges_path, "id,edge_type,from_node_id,to_node_id,length\n");
        let err = load_network(&cfg.nodes_path, &cfg.edges_path).unwrap_err();
        assert!(matches!(err, LoadError::Csv { .. }), "{err}");
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let dir = TempDir::new().unwrap();
        let cfg = network_in(&dir);
        write(
            &cfg.nodes_path,
            "id,node_type,position_x,position_y,nominal_voltage,capacity,current_load,cluster_id\n\
             G_0,GENERATION_PLANT,0,0,230,,0,\n",
        );
        write(
            &cfg.edges_path,
            "id,edge_type,from_node_id,to_node_id,length\nE_0,MV_SEGMENT,G_0,DS_9,1\n",
        );
        let err = load_network(&cfg.nodes_path, &cfg.edges_path).unwrap_err();
        assert!(matches!(err, LoadError::Graph(_)), "{err}");
    }

    #[test]
    fn test_missing_files_without_generator() {
        let dir = TempDir::new().unwrap();
        let cfg = network_in(&dir);
        let err = load_or_generate(&cfg, None).unwrap_err();
        assert!(matches!(err, LoadError::MissingSource { .. }));
    }

    #[test]
    fn test_missing_files_with_generator_are_created() {
        let dir = TempDir::new().unwrap();
        let mut cfg = network_in(&dir);
        cfg.nodes_path = dir.path().join("data/nodes.csv");
        cfg.edges_path = dir.path().join("data/edges.csv");

        let generated = load_or_generate(&cfg, Some(&GeneratorConfig::default())).unwrap();
        assert!(cfg.nodes_path.exists());
        assert!(cfg.edges_path.exists());

        // Second start reads the files back.
        let reloaded = load_or_generate(&cfg, None).unwrap();
        assert_eq!(reloaded.node_count(), generated.node_count());
    }
}
