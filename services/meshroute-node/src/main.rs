use anyhow::{bail, Context};
use meshroute_core::{logging, Config, NodeAddress, MAX_SIMULATED_PEERS};
use meshroute_mesh::node::{Collaborators, MeshNode, NodeHandle};
use meshroute_mesh::sim::{RecordingNetif, SimGyro, SimMesh, TracingSink};
use meshroute_mesh::MotionSensor;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const NODE_PROTOCOL_VERSION: u32 = 1;
const NODE_RUNTIME_VERSION: u32 = 1;
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    runtime_version: u32,
    protocol_version: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--version-json") {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            runtime_version: NODE_RUNTIME_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let config = match parse_config_path(&args)? {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default_config(),
    };
    logging::init_with(config.node.log_json);

    let me = config.node.address;
    let mesh = SimMesh::with_mesh_id(config.mesh.mesh_id, me, EVENT_CHANNEL_CAPACITY);
    let mut nodes = vec![spawn_node(&mesh, &config, me)?];
    for i in 1..=config.simulation.nodes {
        nodes.push(spawn_node(&mesh, &config, peer_address(me, i)?)?);
    }
    for &address in &config.simulation.unreachable {
        warn!(%address, "marking destination unreachable");
        mesh.set_unresponsive(address);
    }

    info!(
        address = %me,
        mesh_id = %config.mesh.mesh_id,
        peers = config.simulation.nodes,
        "[meshroute-node] started"
    );
    mesh.bring_up().await.context("bringing up the mesh")?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    for node in nodes {
        node.shutdown().await;
    }
    Ok(())
}

fn spawn_node(mesh: &SimMesh, config: &Config, address: NodeAddress) -> anyhow::Result<NodeHandle> {
    let (link, io) = mesh.join(address)?;
    let sensor: Option<Arc<dyn MotionSensor>> = if config.sensor.enabled {
        Some(Arc::new(SimGyro::new([1000, 355, 112], 40)))
    } else {
        None
    };
    let collaborators = Collaborators {
        link: Arc::new(link),
        netif: Arc::new(RecordingNetif::new()),
        sink: Arc::new(TracingSink),
        sensor,
    };
    Ok(MeshNode::spawn(config, collaborators, io.into())?)
}

// Offsets up to MAX_SIMULATED_PEERS never wrap back onto the base address.
fn peer_address(base: NodeAddress, offset: usize) -> anyhow::Result<NodeAddress> {
    if offset == 0 || offset > MAX_SIMULATED_PEERS {
        bail!("peer offset {offset} outside 1..={MAX_SIMULATED_PEERS}");
    }
    let mut bytes = *base.as_bytes();
    bytes[5] = bytes[5].wrapping_add(u8::try_from(offset)?);
    Ok(NodeAddress::new(bytes))
}

fn parse_config_path(args: &[String]) -> anyhow::Result<Option<PathBuf>> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            if let Some(path) = args_iter.next() {
                return Ok(Some(PathBuf::from(path)));
            }
            bail!("--config was provided without a path");
        }
    }
    Ok(None)
}
