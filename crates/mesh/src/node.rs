//! Node assembly.
//!
//! Wires the store, role state, inbound handler, observer, distributor and
//! telemetry task together and owns their tokio tasks. The inbound and
//! topology loops start immediately; distribution and telemetry start once,
//! the first time the station gets an address.

use meshroute_core::Config;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::distributor::{Distributor, DistributorSettings};
use crate::error::MeshResult;
use crate::event::MeshEvent;
use crate::handler::{run_inbound_loop, InboundHandler};
use crate::link::{Datagram, MeshLink, MotionSensor, NetifControl, StatusSink};
use crate::observer::MeshEventObserver;
use crate::sim::SimNodeIo;
use crate::state::NodeState;
use crate::store::RouteTableStore;
use crate::telemetry::{TelemetrySettings, TelemetryTask};

/// External services a node runs against.
#[derive(Clone)]
pub struct Collaborators {
    /// Mesh link layer
    pub link: Arc<dyn MeshLink>,
    /// Network interface control
    pub netif: Arc<dyn NetifControl>,
    /// Status publisher
    pub sink: Arc<dyn StatusSink>,
    /// Optional gyroscope
    pub sensor: Option<Arc<dyn MotionSensor>>,
}

/// Inbound channels from the link layer.
pub struct NodeIo {
    /// Received datagrams
    pub datagrams: mpsc::Receiver<Datagram>,
    /// Topology events
    pub events: mpsc::Receiver<MeshEvent>,
}

impl From<SimNodeIo> for NodeIo {
    fn from(io: SimNodeIo) -> Self {
        Self {
            datagrams: io.datagrams,
            events: io.events,
        }
    }
}

/// Entry point for starting a node.
pub struct MeshNode;

impl MeshNode {
    /// Spawn every task of a node. Must be called from inside a tokio runtime.
    ///
    /// The config is validated first; nothing is spawned when it is rejected.
    pub fn spawn(
        config: &Config,
        collaborators: Collaborators,
        io: NodeIo,
    ) -> MeshResult<NodeHandle> {
        config.validate()?;

        let store = Arc::new(RouteTableStore::new(config.mesh.route_table_capacity));
        let state = Arc::new(NodeState::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let distributor = Arc::new(Distributor::new(
            Arc::clone(&collaborators.link),
            Arc::clone(&collaborators.sink),
            Arc::clone(&store),
            Arc::clone(&state),
            DistributorSettings::from_config(config),
        )?);

        let telemetry = match (&collaborators.sensor, config.sensor.enabled) {
            (Some(sensor), true) => Some(TelemetryTask::new(
                Arc::clone(sensor),
                Arc::clone(&collaborators.sink),
                TelemetrySettings::from_config(config),
            )?),
            (None, true) => {
                warn!("sensor enabled but no device attached, telemetry disabled");
                None
            }
            _ => None,
        };

        let (observer, ready_rx) = MeshEventObserver::new(
            Arc::clone(&collaborators.link),
            Arc::clone(&collaborators.netif),
            Arc::clone(&state),
        );

        let mut tasks = Vec::with_capacity(3);
        tasks.push(tokio::spawn(run_inbound_loop(
            InboundHandler::new(Arc::clone(&store)),
            io.datagrams,
            shutdown_rx.clone(),
        )));
        tasks.push(tokio::spawn(observer.run(io.events, shutdown_rx.clone())));
        tasks.push(tokio::spawn(launch_when_ready(
            Arc::clone(&distributor),
            telemetry,
            ready_rx.clone(),
            shutdown_rx,
        )));

        info!(
            address = %collaborators.link.address(),
            mesh_id = %collaborators.link.mesh_id(),
            "mesh node started"
        );

        Ok(NodeHandle {
            store,
            state,
            distributor,
            ready: ready_rx,
            shutdown: shutdown_tx,
            tasks,
        })
    }
}

async fn launch_when_ready(
    distributor: Arc<Distributor>,
    telemetry: Option<TelemetryTask>,
    mut ready: watch::Receiver<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let opened = tokio::select! {
        opened = ready.wait_for(|r| *r) => opened.is_ok(),
        _ = shutdown.wait_for(|s| *s) => false,
    };
    if !opened {
        return;
    }

    let mut running = vec![tokio::spawn(distributor.run(shutdown.clone()))];
    if let Some(task) = telemetry {
        running.push(tokio::spawn(task.run(shutdown)));
    }
    for task in running {
        if let Err(err) = task.await {
            warn!(%err, "periodic task ended abnormally");
        }
    }
}

/// Handle to a running node.
pub struct NodeHandle {
    store: Arc<RouteTableStore>,
    state: Arc<NodeState>,
    distributor: Arc<Distributor>,
    ready: watch::Receiver<bool>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeHandle {
    /// Routing table store.
    pub fn store(&self) -> &Arc<RouteTableStore> {
        &self.store
    }

    /// Role state.
    pub fn state(&self) -> &Arc<NodeState> {
        &self.state
    }

    /// Distributor, for keypress broadcasts and on-demand iterations.
    pub fn distributor(&self) -> &Arc<Distributor> {
        &self.distributor
    }

    /// Whether the readiness gate has opened.
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until the readiness gate opens.
    pub async fn wait_ready(&self) {
        let mut ready = self.ready.clone();
        let _ = ready.wait_for(|r| *r).await;
    }

    /// Signal every task to stop and wait for them. A distribution iteration
    /// already in progress finishes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(err) = task.await {
                warn!(%err, "node task ended abnormally");
            }
        }
        info!("mesh node stopped");
    }
}
