//! Node role and layer state.
//!
//! Written only by the topology observer, read by the distribution task and
//! diagnostics. Readers get eventually consistent values: a role change may
//! land in the middle of a distribution iteration.

use meshroute_core::NodeAddress;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Layer value before the first topology event.
pub const UNKNOWN_LAYER: i32 = -1;

/// Layer of the root node.
pub const ROOT_LAYER: i32 = 1;

/// Point-in-time copy of the role state for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSnapshot {
    /// Mesh depth
    pub layer: i32,
    /// Whether this node is the root
    pub is_root: bool,
    /// Current parent
    pub parent: Option<NodeAddress>,
    /// Station IPv4 address
    pub ip: Option<Ipv4Addr>,
    /// Topology events seen so far
    pub events_observed: u64,
}

/// Process-wide role/layer state.
#[derive(Debug)]
pub struct NodeState {
    layer: AtomicI32,
    is_root: AtomicBool,
    parent: RwLock<Option<NodeAddress>>,
    ip: RwLock<Option<Ipv4Addr>>,
    events_observed: AtomicU64,
}

impl Default for NodeState {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeState {
    /// Fresh state: unknown layer, not root, no parent, no address.
    pub fn new() -> Self {
        Self {
            layer: AtomicI32::new(UNKNOWN_LAYER),
            is_root: AtomicBool::new(false),
            parent: RwLock::new(None),
            ip: RwLock::new(None),
            events_observed: AtomicU64::new(0),
        }
    }

    /// Current mesh depth, [`UNKNOWN_LAYER`] before the first event.
    pub fn layer(&self) -> i32 {
        self.layer.load(Ordering::Relaxed)
    }

    /// Whether this node holds the root role.
    pub fn is_root(&self) -> bool {
        self.is_root.load(Ordering::Relaxed)
    }

    /// Current parent, if connected.
    pub fn parent(&self) -> Option<NodeAddress> {
        *self.parent.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Station address, once obtained.
    pub fn ip(&self) -> Option<Ipv4Addr> {
        *self.ip.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Topology events applied so far.
    pub fn events_observed(&self) -> u64 {
        self.events_observed.load(Ordering::Relaxed)
    }

    pub(crate) fn set_layer(&self, layer: i32) {
        self.layer.store(layer, Ordering::Relaxed);
    }

    pub(crate) fn set_root(&self, is_root: bool) {
        self.is_root.store(is_root, Ordering::Relaxed);
    }

    pub(crate) fn set_parent(&self, parent: Option<NodeAddress>) {
        *self.parent.write().unwrap_or_else(PoisonError::into_inner) = parent;
    }

    pub(crate) fn set_ip(&self, ip: Ipv4Addr) {
        *self.ip.write().unwrap_or_else(PoisonError::into_inner) = Some(ip);
    }

    pub(crate) fn record_event(&self) {
        self.events_observed.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy every field for reporting.
    pub fn snapshot(&self) -> RoleSnapshot {
        RoleSnapshot {
            layer: self.layer(),
            is_root: self.is_root(),
            parent: self.parent(),
            ip: self.ip(),
            events_observed: self.events_observed(),
        }
    }

    /// Liveness line published every distribution period.
    pub fn status_line(&self) -> String {
        let ip = self.ip().unwrap_or(Ipv4Addr::UNSPECIFIED);
        format!("layer:{} IP:{}", self.layer(), ip)
    }
}
