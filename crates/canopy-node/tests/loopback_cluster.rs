//! End-to-end runs over real sockets on the 127.0.0.0/8 loopback range.
//!
//! Linux routes the whole range to `lo`, so every node gets its own address
//! without any network setup.

#![cfg(target_os = "linux")]

use std::{fs, net::TcpListener, time::Duration};

use canopy_core::NodeAddr;
use canopy_node::{NodeConfig, NodeError, orchestrator};

const DEADLINE: Duration = Duration::from_secs(10);

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn node_yaml(id: u8, port: u16, neighbours: &[u8]) -> String {
    let mut yaml = format!("id: {id}\naddress: 127.0.0.{id}\nport: {port}\nneighbours:\n");
    for n in neighbours {
        let weight = id + n;
        yaml.push_str(&format!(
            "  - id: {n}\n    address: 127.0.0.{n}\n    edge_weight: {weight}\n"
        ));
    }
    yaml
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ring_of_four_builds_spanning_tree() {
    let port = free_port();
    let ring: [(u8, [u8; 2]); 4] = [(1, [2, 4]), (2, [1, 3]), (3, [2, 4]), (4, [3, 1])];
    let configs: Vec<_> = ring
        .iter()
        .map(|(id, ns)| NodeConfig::from_yaml_str(&node_yaml(*id, port, ns)).unwrap())
        .collect();

    let root = NodeAddr::v4(127, 0, 0, 1);
    let tree =
        orchestrator::launch(configs, root, Duration::from_millis(20), DEADLINE).await.unwrap();

    assert_eq!(tree.root(), NodeAddr::v4(127, 0, 0, 1));
    assert_eq!(tree.len(), 4);
    assert_eq!(tree.edges().count(), 3);
    assert!(tree.depth() <= 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn launch_from_config_directory() {
    let port = free_port();
    let dir = tempfile::tempdir().unwrap();
    let star: [(u8, &[u8]); 4] = [(11, &[12, 13, 14]), (12, &[11]), (13, &[11]), (14, &[11])];
    for (id, ns) in star {
        fs::write(dir.path().join(format!("node-{id}.yaml")), node_yaml(id, port, ns)).unwrap();
    }

    let configs: Vec<_> =
        orchestrator::load_dir(dir.path()).unwrap().into_iter().map(|(_, c)| c).collect();
    assert_eq!(configs.len(), 4);

    let root = NodeAddr::v4(127, 0, 0, 11);
    let tree =
        orchestrator::launch(configs, root, Duration::from_millis(20), DEADLINE).await.unwrap();

    assert_eq!(tree.children_of(&root).count(), 3);
    assert_eq!(tree.depth(), 1);
}

#[tokio::test]
async fn launch_rejects_unknown_root() {
    let port = free_port();
    let configs = vec![NodeConfig::from_yaml_str(&node_yaml(21, port, &[])).unwrap()];

    let root = NodeAddr::v4(127, 0, 0, 22);
    let err = orchestrator::launch(configs, root, Duration::ZERO, DEADLINE).await.unwrap_err();

    assert!(err.to_string().contains("root"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn launch_times_out_when_a_node_is_never_reached() {
    let port = free_port();
    // Neither node lists the other, so only the root can ever finish
    let configs: Vec<_> = [31, 32]
        .into_iter()
        .map(|id| NodeConfig::from_yaml_str(&node_yaml(id, port, &[])).unwrap())
        .collect();

    let root = NodeAddr::v4(127, 0, 0, 31);
    let err = orchestrator::launch(configs, root, Duration::ZERO, Duration::from_millis(500))
        .await
        .unwrap_err();

    match err {
        NodeError::Timeout { missing } => assert_eq!(missing, vec![NodeAddr::v4(127, 0, 0, 32)]),
        other => panic!("expected timeout, got {other}"),
    }
}
