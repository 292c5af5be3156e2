//! Startup collaborators: tabular persistence and synthetic topologies.

pub mod generator;
pub mod loader;

pub use generator::{generate, GeneratorConfig};
pub use loader::{export_network, load_network, load_or_generate, read_edges, read_nodes};
