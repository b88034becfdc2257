//! Core functionality for the MeshRoute mesh node.
//!
//! This crate provides the node address type, configuration loading and
//! logging setup shared by the mesh crate and the node service.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{
    Config, MAX_SIMULATED_PEERS, DistributionConfig, MeshConfig, NodeConfig, SensorConfig, SimulationConfig,
    StatusConfig,
};
pub use error::{Error, Result};
pub use types::{NodeAddress, ADDRESS_LEN};
