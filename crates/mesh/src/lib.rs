//! MeshRoute Mesh - node protocol layer for a self-organizing wireless mesh
//!
//! Keeps every node's copy of the mesh routing table in step with the root.
//! The root periodically frames its routing table and sends it point-to-point
//! to every member; each receiver replaces its local copy. A second command
//! reports keypresses across the mesh.
//!
//! # Core Components
//!
//! - **Codec**: one-byte command tag followed by 6-byte node addresses
//! - **Store**: process-wide routing table, replaced atomically
//! - **Inbound Handler**: decodes datagrams and applies them to the store
//! - **Distributor**: root-only periodic fan-out plus a liveness report
//! - **Observer**: topology event state machine and readiness gate
//! - **Telemetry**: gyroscope samples published to the status sink
//!
//! The link layer, interface control, status sink and sensor are traits in
//! [`link`]; [`sim`] provides in-process implementations.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use meshroute_core::{Config, NodeAddress};
//! use meshroute_mesh::node::{Collaborators, MeshNode};
//! use meshroute_mesh::sim::{RecordingNetif, SimMesh, TracingSink};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let me = NodeAddress::new([0x24, 0x0a, 0xc4, 0, 0, 1]);
//! let mesh = SimMesh::new(me, 64);
//! let (link, io) = mesh.join(me)?;
//!
//! let node = MeshNode::spawn(
//!     &Config::default(),
//!     Collaborators {
//!         link: Arc::new(link),
//!         netif: Arc::new(RecordingNetif::new()),
//!         sink: Arc::new(TracingSink),
//!         sensor: None,
//!     },
//!     io.into(),
//! )?;
//! mesh.bring_up().await?;
//! node.wait_ready().await;
//! node.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod codec;
pub mod distributor;
pub mod error;
pub mod event;
pub mod handler;
pub mod link;
pub mod node;
pub mod observer;
pub mod sim;
pub mod state;
pub mod store;
pub mod telemetry;

// Re-export main types
pub use codec::{CommandCodec, CommandTag, Frame, CMD_KEYPRESS, CMD_ROUTE_TABLE};
pub use distributor::{DistributionReport, Distributor, DistributorSettings, SendOutcome};
pub use error::{
    DecodeError, MeshError, MeshResult, SensorError, SinkError, StoreError, TransportError,
};
pub use event::MeshEvent;
pub use handler::{run_inbound_loop, InboundHandler, InboundOutcome};
pub use link::{Datagram, MeshLink, MotionSensor, NetifControl, StatusSink};
pub use node::{Collaborators, MeshNode, NodeHandle, NodeIo};
pub use observer::MeshEventObserver;
pub use state::{NodeState, RoleSnapshot};
pub use store::{RouteTable, RouteTableStore};
pub use telemetry::{format_sample, TelemetrySettings, TelemetryTask};
