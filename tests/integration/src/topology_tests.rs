//! Topology events driving a running node
//!
//! # Test Scenarios
//!
//! 1. **Bring-up**: role, parent and interface calls after the event sequence
//! 2. **Root switch**: distribution follows the root role to its new holder
//! 3. **Readiness gate**: nothing is published before an address is assigned

use crate::test_utils::{addr, fast_config, wait_until, TestCluster};
use meshroute_mesh::sim::{NetifCall, ROUTER_BSSID};
use meshroute_mesh::MeshEvent;
use std::net::Ipv4Addr;
use std::time::Duration;

#[tokio::test]
async fn test_bring_up_sets_roles() {
    let cluster = TestCluster::start(&[addr(1), addr(2)], &fast_config());
    cluster.bring_up().await;

    let root = cluster.node(addr(1));
    let snapshot = root.handle.state().snapshot();
    assert!(snapshot.is_root);
    assert_eq!(snapshot.layer, 1);
    assert_eq!(snapshot.parent, Some(ROUTER_BSSID));
    assert_eq!(snapshot.ip, Some(Ipv4Addr::new(10, 0, 0, 2)));
    assert_eq!(snapshot.events_observed, 3);
    assert_eq!(
        root.netif.calls(),
        vec![
            NetifCall::Start { is_root: true },
            NetifCall::StartRootAp {
                is_root: true,
                dns: Some(Ipv4Addr::new(10, 0, 0, 1)),
            },
        ]
    );

    let peer = cluster.node(addr(2)).handle.state().snapshot();
    assert!(!peer.is_root);
    assert_eq!(peer.layer, 2);
    assert_eq!(peer.parent, Some(addr(1)));
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_distribution_follows_root_switch() {
    let cluster = TestCluster::start(&[addr(1), addr(2), addr(3)], &fast_config());
    cluster.bring_up().await;

    cluster.mesh.switch_root(addr(2)).await.unwrap();
    let old_root = cluster.node(addr(1)).handle.state().clone();
    let new_root = cluster.node(addr(2)).handle.state().clone();
    assert!(
        wait_until(Duration::from_secs(1), || new_root.is_root() && !old_root.is_root()).await
    );

    let report = cluster.node(addr(1)).handle.distributor().run_once().await;
    assert!(!report.was_root);
    assert!(report.sends.is_empty());

    let report = cluster.node(addr(2)).handle.distributor().run_once().await;
    assert!(report.was_root);
    assert_eq!(report.sends.len(), 3);
    assert_eq!(report.failed(), 0);
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_nothing_published_until_address_assigned() {
    let cluster = TestCluster::start(&[addr(1)], &fast_config());
    let node = cluster.node(addr(1));

    cluster
        .mesh
        .emit(
            addr(1),
            MeshEvent::ParentConnected {
                layer: 1,
                parent: ROUTER_BSSID,
            },
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(!node.handle.is_ready());
    assert!(node.sink.published().is_empty());

    cluster
        .mesh
        .emit(
            addr(1),
            MeshEvent::GotIp {
                ip: Ipv4Addr::new(192, 168, 4, 2),
                dns: None,
            },
        )
        .await
        .unwrap();
    node.handle.wait_ready().await;
    let sink = node.sink.clone();
    assert!(
        wait_until(Duration::from_secs(1), || {
            sink.published_on("/topic/ip_mesh_nodo")
                .contains(&"layer:1 IP:192.168.4.2".to_string())
        })
        .await
    );
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_parent_loss_stops_interfaces() {
    let cluster = TestCluster::start(&[addr(1), addr(2)], &fast_config());
    cluster.bring_up().await;

    cluster
        .mesh
        .emit(addr(2), MeshEvent::ParentDisconnected { reason: 2 })
        .await
        .unwrap();
    let netif = cluster.node(addr(2)).netif.clone();
    assert!(
        wait_until(Duration::from_secs(1), || {
            netif.calls().last() == Some(&NetifCall::Stop)
        })
        .await
    );
    cluster.shutdown().await;
}
