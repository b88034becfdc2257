//! Test utilities for multi-node mesh scenarios

use meshroute_core::{Config, NodeAddress};
use meshroute_mesh::node::{Collaborators, MeshNode, NodeHandle};
use meshroute_mesh::sim::{MemorySink, RecordingNetif, SimGyro, SimMesh};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Address with a fixed vendor prefix and the given last byte
pub fn addr(last: u8) -> NodeAddress {
    NodeAddress::new([0x24, 0x0a, 0xc4, 0x00, 0x00, last])
}

/// Config with short periods so scenarios finish quickly
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.distribution.period_ms = 20;
    config.mesh.send_timeout_ms = 100;
    config.sensor.period_ms = 20;
    config
}

/// One node of a [`TestCluster`]
pub struct TestNode {
    pub address: NodeAddress,
    pub handle: NodeHandle,
    pub sink: Arc<MemorySink>,
    pub netif: Arc<RecordingNetif>,
}

/// In-process mesh with every member running a full node
pub struct TestCluster {
    pub mesh: SimMesh,
    pub nodes: Vec<TestNode>,
}

impl TestCluster {
    /// Start `members` nodes; the first one is root.
    pub fn start(members: &[NodeAddress], config: &Config) -> Self {
        let mesh = SimMesh::new(members[0], 64);
        let nodes = members
            .iter()
            .map(|&address| {
                let (link, io) = mesh.join(address).expect("join");
                let sink = Arc::new(MemorySink::new());
                let netif = Arc::new(RecordingNetif::new());
                let handle = MeshNode::spawn(
                    config,
                    Collaborators {
                        link: Arc::new(link),
                        netif: netif.clone(),
                        sink: sink.clone(),
                        sensor: Some(Arc::new(SimGyro::new([0, 0, 0], 2))),
                    },
                    io.into(),
                )
                .expect("valid node config");
                TestNode {
                    address,
                    handle,
                    sink,
                    netif,
                }
            })
            .collect();
        Self { mesh, nodes }
    }

    /// Emit the bring-up events and wait for every node to become ready.
    pub async fn bring_up(&self) {
        self.mesh.bring_up().await.expect("bring up");
        for node in &self.nodes {
            node.handle.wait_ready().await;
        }
    }

    pub fn node(&self, address: NodeAddress) -> &TestNode {
        self.nodes
            .iter()
            .find(|n| n.address == address)
            .expect("node in cluster")
    }

    pub async fn shutdown(self) {
        for node in self.nodes {
            node.handle.shutdown().await;
        }
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    condition()
}
