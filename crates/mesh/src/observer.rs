//! Mesh Event Observer
//!
//! Applies topology events to [`NodeState`], drives the network interface
//! services, and opens the readiness gate the first time the station gets an
//! address. Handlers run to completion synchronously and never block.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::event::MeshEvent;
use crate::link::{MeshLink, NetifControl};
use crate::state::{NodeState, ROOT_LAYER, UNKNOWN_LAYER};

/// Topology state machine.
pub struct MeshEventObserver {
    link: Arc<dyn MeshLink>,
    netif: Arc<dyn NetifControl>,
    state: Arc<NodeState>,
    last_layer: i32,
    ready: watch::Sender<bool>,
}

fn role_marker(is_root: bool, layer: i32) -> &'static str {
    if is_root {
        "<ROOT>"
    } else if layer == ROOT_LAYER + 1 {
        "<layer2>"
    } else {
        ""
    }
}

impl MeshEventObserver {
    /// Create an observer and the receiver side of its readiness gate.
    pub fn new(
        link: Arc<dyn MeshLink>,
        netif: Arc<dyn NetifControl>,
        state: Arc<NodeState>,
    ) -> (Self, watch::Receiver<bool>) {
        let (ready, ready_rx) = watch::channel(false);
        let observer = Self {
            link,
            netif,
            state,
            last_layer: UNKNOWN_LAYER,
            ready,
        };
        (observer, ready_rx)
    }

    /// Apply one event.
    pub fn handle(&mut self, event: &MeshEvent) {
        self.state.record_event();
        debug!(
            event = event.name(),
            mutating = event.mutates_state(),
            "topology event"
        );

        match event {
            MeshEvent::Started { mesh_id } => {
                self.state.set_layer(self.link.layer());
                info!("<MESH_EVENT_MESH_STARTED>ID:{}", mesh_id);
            }
            MeshEvent::Stopped => {
                self.state.set_layer(self.link.layer());
                info!("<MESH_EVENT_STOPPED>");
            }
            MeshEvent::ParentConnected { layer, parent } => {
                let is_root = self.link.is_root();
                self.state.set_layer(*layer);
                self.state.set_parent(Some(*parent));
                self.state.set_root(is_root);
                info!(
                    "<MESH_EVENT_PARENT_CONNECTED>layer:{}-->{}, parent:{}{}, ID:{}",
                    self.last_layer,
                    layer,
                    parent,
                    role_marker(is_root, *layer),
                    self.link.mesh_id()
                );
                self.last_layer = *layer;
                self.netif.start(is_root);
            }
            MeshEvent::ParentDisconnected { reason } => {
                info!("<MESH_EVENT_PARENT_DISCONNECTED>reason:{}", reason);
                self.state.set_layer(self.link.layer());
                self.state.set_root(self.link.is_root());
                self.netif.stop();
            }
            MeshEvent::LayerChange { new_layer } => {
                let is_root = self.link.is_root();
                self.state.set_layer(*new_layer);
                self.state.set_root(is_root);
                info!(
                    "<MESH_EVENT_LAYER_CHANGE>layer:{}-->{}{}",
                    self.last_layer,
                    new_layer,
                    role_marker(is_root, *new_layer)
                );
                self.last_layer = *new_layer;
            }
            MeshEvent::RootSwitchAck => {
                let layer = self.link.layer();
                let parent = self.link.parent_address();
                self.state.set_layer(layer);
                self.state.set_parent(parent);
                self.state.set_root(self.link.is_root());
                match parent {
                    Some(parent) => {
                        info!("<MESH_EVENT_ROOT_SWITCH_ACK>layer:{}, parent:{}", layer, parent)
                    }
                    None => info!("<MESH_EVENT_ROOT_SWITCH_ACK>layer:{}, parent:none", layer),
                }
            }
            MeshEvent::GotIp { ip, dns } => {
                info!("<IP_EVENT_STA_GOT_IP>IP:{}", ip);
                self.state.set_ip(*ip);
                self.netif.start_root_ap(self.state.is_root(), *dns);
                let opened = self.ready.send_if_modified(|ready| !std::mem::replace(ready, true));
                if opened {
                    info!("network ready, starting distribution");
                }
            }
            MeshEvent::ChildConnected { aid, mac } => {
                info!("<MESH_EVENT_CHILD_CONNECTED>aid:{}, {}", aid, mac);
            }
            MeshEvent::ChildDisconnected { aid, mac } => {
                info!("<MESH_EVENT_CHILD_DISCONNECTED>aid:{}, {}", aid, mac);
            }
            MeshEvent::RoutingTableAdd { change, new_size } => {
                warn!("<MESH_EVENT_ROUTING_TABLE_ADD>add {}, new:{}", change, new_size);
            }
            MeshEvent::RoutingTableRemove { change, new_size } => {
                warn!(
                    "<MESH_EVENT_ROUTING_TABLE_REMOVE>remove {}, new:{}",
                    change, new_size
                );
            }
            MeshEvent::NoParentFound { scan_times } => {
                info!("<MESH_EVENT_NO_PARENT_FOUND>scan times:{}", scan_times);
            }
            MeshEvent::RootAddress { addr } => {
                info!("<MESH_EVENT_ROOT_ADDRESS>root address:{}", addr);
            }
            MeshEvent::VoteStarted {
                attempts,
                reason,
                rc_addr,
            } => {
                info!(
                    "<MESH_EVENT_VOTE_STARTED>attempts:{}, reason:{}, rc_addr:{}",
                    attempts, reason, rc_addr
                );
            }
            MeshEvent::VoteStopped => info!("<MESH_EVENT_VOTE_STOPPED>"),
            MeshEvent::RootSwitchReq { reason, rc_addr } => {
                info!(
                    "<MESH_EVENT_ROOT_SWITCH_REQ>reason:{}, rc_addr:{}",
                    reason, rc_addr
                );
            }
            MeshEvent::ToDsState { reachable } => {
                info!("<MESH_EVENT_TODS_REACHABLE>state:{}", u8::from(*reachable));
            }
            MeshEvent::RootFixed { fixed } => {
                info!(
                    "<MESH_EVENT_ROOT_FIXED>{}",
                    if *fixed { "fixed" } else { "not fixed" }
                );
            }
            MeshEvent::RootAskedYield {
                addr,
                rssi,
                capacity,
            } => {
                info!(
                    "<MESH_EVENT_ROOT_ASKED_YIELD>{}, rssi:{}, capacity:{}",
                    addr, rssi, capacity
                );
            }
            MeshEvent::ChannelSwitch { channel } => {
                info!("<MESH_EVENT_CHANNEL_SWITCH>new channel:{}", channel);
            }
            MeshEvent::ScanDone { number } => {
                info!("<MESH_EVENT_SCAN_DONE>number:{}", number);
            }
            MeshEvent::NetworkState { rootless } => {
                info!("<MESH_EVENT_NETWORK_STATE>is_rootless:{}", u8::from(*rootless));
            }
            MeshEvent::StopReconnection => info!("<MESH_EVENT_STOP_RECONNECTION>"),
            MeshEvent::FindNetwork {
                channel,
                router_bssid,
            } => {
                info!(
                    "<MESH_EVENT_FIND_NETWORK>new channel:{}, router BSSID:{}",
                    channel, router_bssid
                );
            }
            MeshEvent::RouterSwitch {
                ssid,
                channel,
                bssid,
            } => {
                info!(
                    "<MESH_EVENT_ROUTER_SWITCH>new router:{}, channel:{}, {}",
                    ssid, channel, bssid
                );
            }
        }
    }

    /// Consume topology events until the channel closes or shutdown is
    /// signalled.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<MeshEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Some(event) => self.handle(&event),
                    None => {
                        debug!("topology event channel closed");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
