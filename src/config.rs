use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::io::GeneratorConfig;
use crate::network::CapacityRules;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub network: NetworkConfig,
    pub generator: Option<GeneratorConfig>,
    pub capacity: CapacityRules,
    pub routing: RoutingConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            request_timeout_secs: 30,
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Where the tabular network description lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub nodes_path: PathBuf,
    pub edges_path: PathBuf,
    /// Synthesize the files from `[generator]` when they are absent.
    pub generate_if_missing: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            nodes_path: PathBuf::from("data/nodes.csv"),
            edges_path: PathBuf::from("data/edges.csv"),
            generate_if_missing: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Physical hops explored when placing a newly added node.
    pub placement_search_hops: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            placement_search_hops: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub min_devices: usize,
    pub max_devices: usize,
    /// Width of the window during which a device's draw stays constant.
    pub noise_block_seconds: u64,
    pub stream_tick_ms: u64,
    pub overload_pct: f64,
    pub consumption_peak_pct: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            min_devices: 3,
            max_devices: 10,
            noise_block_seconds: 60,
            stream_tick_ms: 1000,
            overload_pct: 0.2,
            consumption_peak_pct: 0.5,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("GRID__").split("__"));
        figment
            .extract()
            .context("invalid configuration (config/default.toml or GRID__* environment)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let cfg = Config::load().expect("defaults load");
            assert_eq!(cfg.server.port, 8000);
            assert_eq!(cfg.routing.placement_search_hops, 3);
            assert_eq!(cfg.simulation.noise_block_seconds, 60);
            assert!((cfg.capacity.per_consumer_kw - 1.5).abs() < 1e-9);
            assert!(cfg.generator.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_file_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/default.toml",
                r#"
                [server]
                port = 9100

                [capacity]
                per_consumer_kw = 2.0

                [generator]
                seed = 7
                num_clusters = 2
                "#,
            )?;
            jail.set_env("GRID__SERVER__HOST", "0.0.0.0");
            jail.set_env("GRID__SIMULATION__OVERLOAD_PCT", "0.3");

            let cfg = Config::load().expect("layered load");
            assert_eq!(cfg.server.port, 9100);
            assert_eq!(cfg.server.host, "0.0.0.0");
            assert!((cfg.capacity.per_consumer_kw - 2.0).abs() < 1e-9);
            assert!((cfg.capacity.single_phase_kw - 13.0).abs() < 1e-9);
            assert!((cfg.simulation.overload_pct - 0.3).abs() < 1e-9);
            let generator = cfg.generator.expect("generator section");
            assert_eq!(generator.seed, 7);
            assert_eq!(generator.num_clusters, 2);
            Ok(())
        });
    }
}
