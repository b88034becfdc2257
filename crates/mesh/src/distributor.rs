//! Periodic Distribution Task
//!
//! Every period the node publishes its layer and address to the status sink.
//! When it holds the root role it also pulls the link layer's routing table,
//! stores it, frames it as ROUTE_TABLE and sends it point-to-point to every
//! address in the table. Sends are serialized, bounded by the send timeout,
//! and never retried within an iteration; one failure does not stop the
//! remaining destinations.

use meshroute_core::{Config, NodeAddress};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::codec::{CommandCodec, Frame};
use crate::error::{MeshError, MeshResult, TransportError};
use crate::link::{MeshLink, StatusSink};
use crate::state::NodeState;
use crate::store::RouteTableStore;

/// Timing and topic settings for the distributor.
#[derive(Debug, Clone)]
pub struct DistributorSettings {
    /// Loop period
    pub period: Duration,
    /// Bound on each point-to-point send
    pub send_timeout: Duration,
    /// Topic for liveness lines
    pub liveness_topic: String,
}

impl DistributorSettings {
    /// Pull the relevant values out of the node config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            period: config.distribution.period(),
            send_timeout: config.mesh.send_timeout(),
            liveness_topic: config.status.liveness_topic.clone(),
        }
    }

    /// Reject a zero period or send timeout.
    pub fn validate(&self) -> MeshResult<()> {
        if self.period.is_zero() {
            return Err(MeshError::InvalidSettings(
                "distribution period must be non-zero".to_string(),
            ));
        }
        if self.send_timeout.is_zero() {
            return Err(MeshError::InvalidSettings(
                "send timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of one point-to-point send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    /// Destination node
    pub dest: NodeAddress,
    /// Transport result
    pub result: Result<(), TransportError>,
}

impl SendOutcome {
    /// 0 on success, the transport's code otherwise.
    pub fn code(&self) -> i32 {
        match &self.result {
            Ok(()) => 0,
            Err(err) => err.code(),
        }
    }
}

/// Summary of one distribution iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionReport {
    /// Whether the liveness line reached the sink
    pub status_published: bool,
    /// Whether the node was root when the iteration started
    pub was_root: bool,
    /// Per-destination results in send order
    pub sends: Vec<SendOutcome>,
}

impl DistributionReport {
    /// Number of sends that failed.
    pub fn failed(&self) -> usize {
        self.sends.iter().filter(|s| s.result.is_err()).count()
    }
}

/// Root-driven routing table publisher.
pub struct Distributor {
    link: Arc<dyn MeshLink>,
    sink: Arc<dyn StatusSink>,
    store: Arc<RouteTableStore>,
    state: Arc<NodeState>,
    codec: CommandCodec,
    settings: DistributorSettings,
}

impl Distributor {
    /// Create a distributor over the given collaborators. Fails when the
    /// settings have a zero period or timeout.
    pub fn new(
        link: Arc<dyn MeshLink>,
        sink: Arc<dyn StatusSink>,
        store: Arc<RouteTableStore>,
        state: Arc<NodeState>,
        settings: DistributorSettings,
    ) -> MeshResult<Self> {
        settings.validate()?;
        Ok(Self {
            codec: CommandCodec::new(store.capacity()),
            link,
            sink,
            store,
            state,
            settings,
        })
    }

    /// Run one iteration: status report, then fan-out if root.
    pub async fn run_once(&self) -> DistributionReport {
        let status = self.state.status_line();
        info!("Tried to publish {}", status);
        let status_published = match self
            .sink
            .publish(&self.settings.liveness_topic, &status)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(topic = %self.settings.liveness_topic, %err, "status publish failed");
                false
            }
        };

        let was_root = self.state.is_root();
        let mut report = DistributionReport {
            status_published,
            was_root,
            sends: Vec::new(),
        };
        if !was_root {
            return report;
        }

        let mut table = self.link.routing_table(self.store.capacity());
        table.truncate(self.store.capacity());

        let frame = match self.codec.encode(&Frame::RouteTable(table.clone())) {
            Ok(frame) => frame,
            Err(err) => {
                error!(%err, "failed to encode routing table");
                return report;
            }
        };
        if let Err(err) = self.store.replace(table.clone()) {
            error!(%err, "failed to store routing table");
        }

        for (i, dest) in table.into_iter().enumerate() {
            let outcome = self.send_one(dest, &frame).await;
            match &outcome.result {
                Ok(()) => info!(
                    "Sending routing table to [{}] {}: sent with err code: {}",
                    i,
                    dest,
                    outcome.code()
                ),
                Err(err) => warn!(
                    %err,
                    "Sending routing table to [{}] {}: sent with err code: {}",
                    i,
                    dest,
                    outcome.code()
                ),
            }
            report.sends.push(outcome);
        }
        report
    }

    /// Send a KEYPRESS frame naming this node to every address currently in
    /// the routing table store.
    pub async fn broadcast_keypress(&self) -> Vec<SendOutcome> {
        let me = self.link.address();
        let frame = match self.codec.encode(&Frame::Keypress(me)) {
            Ok(frame) => frame,
            Err(err) => {
                error!(%err, "failed to encode keypress");
                return Vec::new();
            }
        };

        let table = self.store.snapshot();
        let mut outcomes = Vec::with_capacity(table.len());
        for &dest in table.entries() {
            let outcome = self.send_one(dest, &frame).await;
            if let Err(err) = &outcome.result {
                warn!(dest = %dest, code = outcome.code(), %err, "keypress send failed");
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn send_one(&self, dest: NodeAddress, frame: &[u8]) -> SendOutcome {
        let timeout = self.settings.send_timeout;
        let result = match tokio::time::timeout(timeout, self.link.send(dest, frame, timeout)).await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(dest)),
        };
        SendOutcome { dest, result }
    }

    /// Loop until shutdown is signalled. The flag is checked between
    /// iterations only; an iteration in progress always completes.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.settings.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_once().await;
            debug!(
                status_published = report.status_published,
                was_root = report.was_root,
                attempted = report.sends.len(),
                failed = report.failed(),
                "distribution iteration complete"
            );
        }
        info!("distribution task stopped");
    }
}
