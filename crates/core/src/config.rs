//! Configuration management for MeshRoute.
//!
//! Every section falls back to its defaults, so a config file only needs to
//! name the values it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::NodeAddress;

/// Largest `simulation.nodes` value; peer addresses differ in one byte.
pub const MAX_SIMULATED_PEERS: usize = 255;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    pub mesh: MeshConfig,
    pub distribution: DistributionConfig,
    pub status: StatusConfig,
    pub sensor: SensorConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Station address of this node
    pub address: NodeAddress,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub mesh_id: NodeAddress,
    /// Upper bound on a single point-to-point send
    pub send_timeout_ms: u64,
    /// Maximum number of addresses a routing table may hold
    pub route_table_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    pub period_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub liveness_topic: String,
    pub telemetry_topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub enabled: bool,
    pub period_ms: u64,
    /// Raw counts per degree/second
    pub scale: f32,
    /// Per-axis bias subtracted after scaling (X, Y, Z)
    pub offset: [f32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Peers joined to the in-process mesh besides this node
    pub nodes: usize,
    /// Addresses whose sends never complete
    pub unreachable: Vec<NodeAddress>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address: NodeAddress::new([0x24, 0x0a, 0xc4, 0x00, 0x00, 0x01]),
            log_json: false,
        }
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            mesh_id: NodeAddress::new([0x77, 0x77, 0x77, 0x77, 0x77, 0x76]),
            send_timeout_ms: 30_000,
            route_table_capacity: 50,
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self { period_ms: 2_000 }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            liveness_topic: "/topic/ip_mesh_nodo".to_string(),
            telemetry_topic: "/topic/nodo/giroscopio".to_string(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_ms: 2_000,
            scale: 131.0,
            offset: [7.64, 2.71, 0.86],
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            nodes: 3,
            unreachable: Vec::new(),
        }
    }
}

impl MeshConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl DistributionConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl SensorConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), address = %config.node.address, "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self::default()
    }

    /// Reject values the runtime cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.mesh.route_table_capacity == 0 {
            return Err(Error::InvalidConfig(
                "mesh.route_table_capacity must be at least 1".to_string(),
            ));
        }
        if self.mesh.send_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "mesh.send_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.distribution.period_ms == 0 {
            return Err(Error::InvalidConfig(
                "distribution.period_ms must be non-zero".to_string(),
            ));
        }
        if self.sensor.enabled && (self.sensor.period_ms == 0 || self.sensor.scale == 0.0) {
            return Err(Error::InvalidConfig(
                "sensor.period_ms and sensor.scale must be non-zero".to_string(),
            ));
        }
        // Peers are numbered by the last address byte, and the root's table
        // lists every member.
        let members = self.simulation.nodes + 1;
        if self.simulation.nodes > MAX_SIMULATED_PEERS
            || members > self.mesh.route_table_capacity
        {
            return Err(Error::InvalidConfig(format!(
                "simulation.nodes {} must be at most {} and leave room for the root in mesh.route_table_capacity {}",
                self.simulation.nodes, MAX_SIMULATED_PEERS, self.mesh.route_table_capacity
            )));
        }
        Ok(())
    }
}
