//! Collaborator seams: the mesh link layer, the network interface services,
//! the status sink and the motion sensor.
//!
//! The node only ever talks to these through the traits below; the `sim`
//! module provides in-process implementations.

use async_trait::async_trait;
use meshroute_core::NodeAddress;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::error::{SensorError, SinkError, TransportError};

/// One datagram delivered to this node by the mesh transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Sending node
    pub from: NodeAddress,
    /// Raw application payload (a command frame)
    pub payload: Vec<u8>,
}

/// Send/query primitives of the underlying mesh link layer.
#[async_trait]
pub trait MeshLink: Send + Sync {
    /// This node's station address.
    fn address(&self) -> NodeAddress;

    /// Identifier of the mesh network.
    fn mesh_id(&self) -> NodeAddress;

    /// Current depth in the mesh tree, root = 1, -1 when unattached.
    fn layer(&self) -> i32;

    /// Whether this node currently holds the root role.
    fn is_root(&self) -> bool;

    /// Address of the current parent, if attached.
    fn parent_address(&self) -> Option<NodeAddress>;

    /// The link layer's routing table, truncated to `capacity` entries.
    fn routing_table(&self, capacity: usize) -> Vec<NodeAddress>;

    /// Point-to-point, at-most-once send that gives up after `timeout`.
    async fn send(
        &self,
        dest: NodeAddress,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<(), TransportError>;
}

/// IP-level interface services layered over the mesh.
///
/// Implementations must return promptly; they are called from the topology
/// event loop.
pub trait NetifControl: Send + Sync {
    /// Bring up the station/AP interfaces for the given role.
    fn start(&self, is_root: bool);

    /// Tear down the interfaces.
    fn stop(&self);

    /// Start the root's access point once an upstream address is known.
    fn start_root_ap(&self, is_root: bool, dns: Option<Ipv4Addr>);
}

/// Best-effort publication of status strings.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Publish `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), SinkError>;
}

/// Three-axis gyroscope.
pub trait MotionSensor: Send + Sync {
    /// Raw X/Y/Z angular rate counts.
    fn read_gyro(&self) -> Result<[i16; 3], SensorError>;
}
