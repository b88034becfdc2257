//! Topology events delivered by the mesh link layer.

use meshroute_core::NodeAddress;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Every event the link layer and station interface report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeshEvent {
    /// Mesh started
    Started {
        /// Mesh network identifier
        mesh_id: NodeAddress,
    },
    /// Mesh stopped
    Stopped,
    /// A child associated with this node
    ChildConnected {
        /// Association id
        aid: u16,
        /// Child station address
        mac: NodeAddress,
    },
    /// A child left
    ChildDisconnected {
        /// Association id
        aid: u16,
        /// Child station address
        mac: NodeAddress,
    },
    /// Entries were added below this node
    RoutingTableAdd {
        /// Number of entries added
        change: u16,
        /// New table size
        new_size: u16,
    },
    /// Entries were removed below this node
    RoutingTableRemove {
        /// Number of entries removed
        change: u16,
        /// New table size
        new_size: u16,
    },
    /// Parent scan found nothing
    NoParentFound {
        /// Scans attempted
        scan_times: u32,
    },
    /// Associated with a parent
    ParentConnected {
        /// This node's new layer
        layer: i32,
        /// Parent BSSID
        parent: NodeAddress,
    },
    /// Lost the parent
    ParentDisconnected {
        /// Link layer reason code
        reason: u16,
    },
    /// Moved to another depth
    LayerChange {
        /// New layer
        new_layer: i32,
    },
    /// Root address announced
    RootAddress {
        /// Root station address
        addr: NodeAddress,
    },
    /// Root election started
    VoteStarted {
        /// Election attempts
        attempts: u32,
        /// Reason code
        reason: u16,
        /// Candidate root
        rc_addr: NodeAddress,
    },
    /// Root election finished
    VoteStopped,
    /// Asked to switch root
    RootSwitchReq {
        /// Reason code
        reason: u16,
        /// Candidate root
        rc_addr: NodeAddress,
    },
    /// Root switch completed; this node has just gained or ceded root
    RootSwitchAck,
    /// Reachability of the external network changed
    ToDsState {
        /// Whether the DS is reachable
        reachable: bool,
    },
    /// Root fixed flag changed
    RootFixed {
        /// Whether the root is fixed
        fixed: bool,
    },
    /// Another root asked this one to yield
    RootAskedYield {
        /// Conflicting root
        addr: NodeAddress,
        /// Its signal strength
        rssi: i8,
        /// Its capacity
        capacity: u32,
    },
    /// Mesh moved to another channel
    ChannelSwitch {
        /// New channel
        channel: u8,
    },
    /// Scan completed
    ScanDone {
        /// Networks found
        number: u8,
    },
    /// Rootless state changed
    NetworkState {
        /// Whether the mesh has no root
        rootless: bool,
    },
    /// Reconnection attempts stopped
    StopReconnection,
    /// A matching network was found
    FindNetwork {
        /// Channel of the network
        channel: u8,
        /// Router BSSID
        router_bssid: NodeAddress,
    },
    /// Router changed
    RouterSwitch {
        /// New router SSID
        ssid: String,
        /// Router channel
        channel: u8,
        /// Router BSSID
        bssid: NodeAddress,
    },
    /// Station interface obtained an IPv4 address
    GotIp {
        /// Assigned address
        ip: Ipv4Addr,
        /// Primary DNS server, if any
        dns: Option<Ipv4Addr>,
    },
}

impl MeshEvent {
    /// Short label used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            MeshEvent::Started { .. } => "MESH_STARTED",
            MeshEvent::Stopped => "STOPPED",
            MeshEvent::ChildConnected { .. } => "CHILD_CONNECTED",
            MeshEvent::ChildDisconnected { .. } => "CHILD_DISCONNECTED",
            MeshEvent::RoutingTableAdd { .. } => "ROUTING_TABLE_ADD",
            MeshEvent::RoutingTableRemove { .. } => "ROUTING_TABLE_REMOVE",
            MeshEvent::NoParentFound { .. } => "NO_PARENT_FOUND",
            MeshEvent::ParentConnected { .. } => "PARENT_CONNECTED",
            MeshEvent::ParentDisconnected { .. } => "PARENT_DISCONNECTED",
            MeshEvent::LayerChange { .. } => "LAYER_CHANGE",
            MeshEvent::RootAddress { .. } => "ROOT_ADDRESS",
            MeshEvent::VoteStarted { .. } => "VOTE_STARTED",
            MeshEvent::VoteStopped => "VOTE_STOPPED",
            MeshEvent::RootSwitchReq { .. } => "ROOT_SWITCH_REQ",
            MeshEvent::RootSwitchAck => "ROOT_SWITCH_ACK",
            MeshEvent::ToDsState { .. } => "TODS_STATE",
            MeshEvent::RootFixed { .. } => "ROOT_FIXED",
            MeshEvent::RootAskedYield { .. } => "ROOT_ASKED_YIELD",
            MeshEvent::ChannelSwitch { .. } => "CHANNEL_SWITCH",
            MeshEvent::ScanDone { .. } => "SCAN_DONE",
            MeshEvent::NetworkState { .. } => "NETWORK_STATE",
            MeshEvent::StopReconnection => "STOP_RECONNECTION",
            MeshEvent::FindNetwork { .. } => "FIND_NETWORK",
            MeshEvent::RouterSwitch { .. } => "ROUTER_SWITCH",
            MeshEvent::GotIp { .. } => "IP_STA_GOT_IP",
        }
    }

    /// Whether handling this event can change role or layer state.
    pub fn mutates_state(&self) -> bool {
        matches!(
            self,
            MeshEvent::Started { .. }
                | MeshEvent::Stopped
                | MeshEvent::ParentConnected { .. }
                | MeshEvent::ParentDisconnected { .. }
                | MeshEvent::LayerChange { .. }
                | MeshEvent::RootSwitchAck
                | MeshEvent::GotIp { .. }
        )
    }
}
