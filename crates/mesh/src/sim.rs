//! In-process mesh simulation
//!
//! A hub that connects nodes living in the same process. One joined node is
//! the root: its routing table lists every member in join order, every other
//! node sits at layer 2 under it. Datagrams and topology events travel over
//! bounded tokio channels, one pair per node.
//!
//! Used by the node service when no radio is present and by the tests.

use async_trait::async_trait;
use meshroute_core::NodeAddress;
use rand::Rng;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{MeshError, MeshResult, SensorError, SinkError, TransportError};
use crate::event::MeshEvent;
use crate::link::{Datagram, MeshLink, MotionSensor, NetifControl, StatusSink};
use crate::state::ROOT_LAYER;

/// BSSID reported as the root's parent.
pub const ROUTER_BSSID: NodeAddress = NodeAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Member {
    address: NodeAddress,
    datagrams: mpsc::Sender<Datagram>,
    events: mpsc::Sender<MeshEvent>,
}

struct SimInner {
    mesh_id: NodeAddress,
    root: Mutex<NodeAddress>,
    members: Mutex<Vec<Member>>,
    unresponsive: Mutex<HashSet<NodeAddress>>,
    sent: AtomicUsize,
    channel_capacity: usize,
}

/// Receiving ends handed to a joined node.
pub struct SimNodeIo {
    /// Datagrams addressed to the node
    pub datagrams: mpsc::Receiver<Datagram>,
    /// Topology events for the node
    pub events: mpsc::Receiver<MeshEvent>,
}

/// Shared hub of an in-process mesh.
#[derive(Clone)]
pub struct SimMesh {
    inner: Arc<SimInner>,
}

impl SimMesh {
    /// Create an empty mesh whose root will be `root` once it joins.
    pub fn new(root: NodeAddress, channel_capacity: usize) -> Self {
        Self::with_mesh_id(
            NodeAddress::new([0x77, 0x77, 0x77, 0x77, 0x77, 0x76]),
            root,
            channel_capacity,
        )
    }

    /// Create an empty mesh with an explicit mesh identifier.
    pub fn with_mesh_id(mesh_id: NodeAddress, root: NodeAddress, channel_capacity: usize) -> Self {
        Self {
            inner: Arc::new(SimInner {
                mesh_id,
                root: Mutex::new(root),
                members: Mutex::new(Vec::new()),
                unresponsive: Mutex::new(HashSet::new()),
                sent: AtomicUsize::new(0),
                channel_capacity: channel_capacity.max(1),
            }),
        }
    }

    /// Attach a node. Joining the same address twice is a startup failure.
    pub fn join(&self, address: NodeAddress) -> MeshResult<(SimLink, SimNodeIo)> {
        let mut members = lock(&self.inner.members);
        if members.iter().any(|m| m.address == address) {
            return Err(MeshError::Startup(format!(
                "address {address} already joined the mesh"
            )));
        }

        let (datagram_tx, datagram_rx) = mpsc::channel(self.inner.channel_capacity);
        let (event_tx, event_rx) = mpsc::channel(self.inner.channel_capacity);
        members.push(Member {
            address,
            datagrams: datagram_tx,
            events: event_tx,
        });

        let link = SimLink {
            address,
            inner: Arc::clone(&self.inner),
        };
        let io = SimNodeIo {
            datagrams: datagram_rx,
            events: event_rx,
        };
        Ok((link, io))
    }

    /// Make every send to `address` hang until its timeout.
    pub fn set_unresponsive(&self, address: NodeAddress) {
        lock(&self.inner.unresponsive).insert(address);
    }

    /// Current root.
    pub fn root(&self) -> NodeAddress {
        *lock(&self.inner.root)
    }

    /// Joined addresses in join order.
    pub fn members(&self) -> Vec<NodeAddress> {
        lock(&self.inner.members).iter().map(|m| m.address).collect()
    }

    /// Sends attempted through any link so far.
    pub fn sent_count(&self) -> usize {
        self.inner.sent.load(Ordering::Relaxed)
    }

    /// Deliver a topology event to one node.
    pub async fn emit(&self, address: NodeAddress, event: MeshEvent) -> MeshResult<()> {
        let tx = lock(&self.inner.members)
            .iter()
            .find(|m| m.address == address)
            .map(|m| m.events.clone())
            .ok_or(TransportError::Unreachable(address))?;
        tx.send(event)
            .await
            .map_err(|_| MeshError::from(TransportError::Unreachable(address)))
    }

    /// Emit the bring-up sequence every member would see on a real mesh:
    /// started, parent connected, address assigned.
    pub async fn bring_up(&self) -> MeshResult<()> {
        let root = self.root();
        for (i, address) in self.members().into_iter().enumerate() {
            let (layer, parent) = if address == root {
                (ROOT_LAYER, ROUTER_BSSID)
            } else {
                (ROOT_LAYER + 1, root)
            };
            self.emit(
                address,
                MeshEvent::Started {
                    mesh_id: self.inner.mesh_id,
                },
            )
            .await?;
            self.emit(address, MeshEvent::ParentConnected { layer, parent })
                .await?;
            self.emit(
                address,
                MeshEvent::GotIp {
                    ip: Ipv4Addr::new(10, 0, 0, (i as u8).wrapping_add(2)),
                    dns: Some(Ipv4Addr::new(10, 0, 0, 1)),
                },
            )
            .await?;
        }
        Ok(())
    }

    /// Hand the root role to `new_root` and tell both parties.
    pub async fn switch_root(&self, new_root: NodeAddress) -> MeshResult<()> {
        let old_root = std::mem::replace(&mut *lock(&self.inner.root), new_root);
        self.emit(new_root, MeshEvent::RootSwitchAck).await?;
        if old_root != new_root {
            self.emit(old_root, MeshEvent::RootSwitchAck).await?;
        }
        Ok(())
    }
}

/// One node's view of the simulated mesh.
#[derive(Clone)]
pub struct SimLink {
    address: NodeAddress,
    inner: Arc<SimInner>,
}

#[async_trait]
impl MeshLink for SimLink {
    fn address(&self) -> NodeAddress {
        self.address
    }

    fn mesh_id(&self) -> NodeAddress {
        self.inner.mesh_id
    }

    fn layer(&self) -> i32 {
        if self.is_root() {
            ROOT_LAYER
        } else {
            ROOT_LAYER + 1
        }
    }

    fn is_root(&self) -> bool {
        *lock(&self.inner.root) == self.address
    }

    fn parent_address(&self) -> Option<NodeAddress> {
        if self.is_root() {
            Some(ROUTER_BSSID)
        } else {
            Some(*lock(&self.inner.root))
        }
    }

    fn routing_table(&self, capacity: usize) -> Vec<NodeAddress> {
        if self.is_root() {
            lock(&self.inner.members)
                .iter()
                .map(|m| m.address)
                .take(capacity)
                .collect()
        } else {
            vec![self.address].into_iter().take(capacity).collect()
        }
    }

    async fn send(
        &self,
        dest: NodeAddress,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<(), TransportError> {
        self.inner.sent.fetch_add(1, Ordering::Relaxed);

        let hangs = lock(&self.inner.unresponsive).contains(&dest);
        if hangs {
            tokio::time::sleep(timeout).await;
            return Err(TransportError::Timeout(dest));
        }

        let tx = lock(&self.inner.members)
            .iter()
            .find(|m| m.address == dest)
            .map(|m| m.datagrams.clone())
            .ok_or(TransportError::Unreachable(dest))?;

        let datagram = Datagram {
            from: self.address,
            payload: payload.to_vec(),
        };
        match tokio::time::timeout(timeout, tx.send(datagram)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(TransportError::Unreachable(dest)),
            Err(_) => Err(TransportError::Timeout(dest)),
        }
    }
}

/// Status sink that keeps every publication in memory.
#[derive(Debug)]
pub struct MemorySink {
    published: Mutex<Vec<(String, String)>>,
    connected: AtomicBool,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    /// Connected sink with nothing published.
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        }
    }

    /// Toggle whether publishes succeed.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Every accepted `(topic, payload)` in order.
    pub fn published(&self) -> Vec<(String, String)> {
        lock(&self.published).clone()
    }

    /// Accepted payloads on one topic.
    pub fn published_on(&self, topic: &str) -> Vec<String> {
        lock(&self.published)
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl StatusSink for MemorySink {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), SinkError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(SinkError::Disconnected);
        }
        lock(&self.published).push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

/// Status sink that writes publications to the log.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl StatusSink for TracingSink {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), SinkError> {
        info!(topic, payload, "status published");
        Ok(())
    }
}

/// Calls made on a [`RecordingNetif`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetifCall {
    /// `start(is_root)`
    Start {
        /// Role passed in
        is_root: bool,
    },
    /// `stop()`
    Stop,
    /// `start_root_ap(is_root, dns)`
    StartRootAp {
        /// Role passed in
        is_root: bool,
        /// DNS server passed in
        dns: Option<Ipv4Addr>,
    },
}

/// Interface control that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingNetif {
    calls: Mutex<Vec<NetifCall>>,
}

impl RecordingNetif {
    /// Recorder with no calls yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call in order.
    pub fn calls(&self) -> Vec<NetifCall> {
        lock(&self.calls).clone()
    }
}

impl NetifControl for RecordingNetif {
    fn start(&self, is_root: bool) {
        lock(&self.calls).push(NetifCall::Start { is_root });
    }

    fn stop(&self) {
        lock(&self.calls).push(NetifCall::Stop);
    }

    fn start_root_ap(&self, is_root: bool, dns: Option<Ipv4Addr>) {
        lock(&self.calls).push(NetifCall::StartRootAp { is_root, dns });
    }
}

/// Gyroscope returning a fixed bias plus noise.
#[derive(Debug, Clone)]
pub struct SimGyro {
    bias: [i16; 3],
    noise: i16,
    failing: Arc<AtomicBool>,
}

impl SimGyro {
    /// Readings of `bias ± noise` raw counts per axis.
    pub fn new(bias: [i16; 3], noise: i16) -> Self {
        Self {
            bias,
            noise: noise.saturating_abs(),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make subsequent reads fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

impl MotionSensor for SimGyro {
    fn read_gyro(&self) -> Result<[i16; 3], SensorError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(SensorError::Bus("no ack from device".to_string()));
        }
        let mut rng = rand::thread_rng();
        let mut out = self.bias;
        for axis in out.iter_mut() {
            *axis = axis.saturating_add(rng.gen_range(-self.noise..=self.noise));
        }
        Ok(out)
    }
}
