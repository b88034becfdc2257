//! Routing table distribution across a running mesh
//!
//! # Test Scenarios
//!
//! 1. **Fan-out**: every member's store converges to the root's table
//! 2. **Non-root silence**: non-root nodes report status but send nothing
//! 3. **Unreachable member**: one hung destination does not starve the rest
//! 4. **Malformed frames**: garbage from a member leaves stores untouched
//! 5. **Keypress**: a member reaches every stored address

use crate::test_utils::{addr, fast_config, wait_until, TestCluster};
use meshroute_mesh::{MeshLink, TransportError};
use std::time::Duration;

const CONVERGE: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_members_converge_on_root_table() {
    let members = [addr(1), addr(2), addr(3)];
    let cluster = TestCluster::start(&members, &fast_config());
    cluster.bring_up().await;

    for node in &cluster.nodes {
        let store = node.handle.store().clone();
        assert!(
            wait_until(CONVERGE, || store.snapshot().entries() == members).await,
            "{} did not converge",
            node.address
        );
    }
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_every_node_reports_liveness() {
    let cluster = TestCluster::start(&[addr(1), addr(2)], &fast_config());
    cluster.bring_up().await;

    let root_sink = cluster.node(addr(1)).sink.clone();
    let peer_sink = cluster.node(addr(2)).sink.clone();
    assert!(
        wait_until(CONVERGE, || {
            root_sink
                .published_on("/topic/ip_mesh_nodo")
                .contains(&"layer:1 IP:10.0.0.2".to_string())
                && peer_sink
                    .published_on("/topic/ip_mesh_nodo")
                    .contains(&"layer:2 IP:10.0.0.3".to_string())
        })
        .await
    );
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_non_root_never_distributes() {
    let cluster = TestCluster::start(&[addr(1), addr(2), addr(3)], &fast_config());
    cluster.bring_up().await;

    let report = cluster.node(addr(3)).handle.distributor().run_once().await;
    assert!(!report.was_root);
    assert!(report.sends.is_empty());

    let report = cluster.node(addr(1)).handle.distributor().run_once().await;
    assert!(report.was_root);
    assert_eq!(report.sends.len(), 3);
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_member_does_not_block_others() {
    let cluster = TestCluster::start(&[addr(1), addr(2), addr(3)], &fast_config());
    cluster.mesh.set_unresponsive(addr(2));
    cluster.bring_up().await;

    let reachable = cluster.node(addr(3)).handle.store().clone();
    assert!(wait_until(CONVERGE, || reachable.len() == 3).await);
    assert!(cluster.node(addr(2)).handle.store().is_empty());

    let report = cluster.node(addr(1)).handle.distributor().run_once().await;
    assert_eq!(report.failed(), 1);
    assert_eq!(report.sends[1].result, Err(TransportError::Timeout(addr(2))));
    assert_eq!(report.sends[1].code(), -1);
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frames_leave_store_alone() {
    let members = [addr(1), addr(2)];
    let cluster = TestCluster::start(&members, &fast_config());
    cluster.bring_up().await;

    let store = cluster.node(addr(2)).handle.store().clone();
    assert!(wait_until(CONVERGE, || store.len() == 2).await);

    // Stop distribution so the only traffic left is ours.
    let (root, peer) = {
        let mut nodes = cluster.nodes.into_iter();
        (nodes.next().unwrap(), nodes.next().unwrap())
    };
    root.handle.shutdown().await;
    let before = peer.handle.store().snapshot();

    let (rogue, _rogue_io) = cluster.mesh.join(addr(9)).unwrap();
    let timeout = Duration::from_millis(100);
    for payload in [
        vec![0x56, 1, 2, 3, 4, 5, 6, 7],
        vec![0x42, 0, 0, 0, 0, 0, 0],
        vec![0x55, 1, 2, 3],
        vec![],
    ] {
        rogue.send(addr(2), &payload, timeout).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(peer.handle.store().snapshot(), before);
    peer.handle.shutdown().await;
}

#[tokio::test]
async fn test_keypress_reaches_every_stored_address() {
    let members = [addr(1), addr(2), addr(3)];
    let cluster = TestCluster::start(&members, &fast_config());
    cluster.bring_up().await;

    let store = cluster.node(addr(3)).handle.store().clone();
    assert!(wait_until(CONVERGE, || store.len() == 3).await);

    let outcomes = cluster
        .node(addr(3))
        .handle
        .distributor()
        .broadcast_keypress()
        .await;
    let dests: Vec<_> = outcomes.iter().map(|o| o.dest).collect();
    assert_eq!(dests, members);
    assert!(outcomes.iter().all(|o| o.code() == 0));
    cluster.shutdown().await;
}
