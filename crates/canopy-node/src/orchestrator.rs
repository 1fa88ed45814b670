//! Run every node of a deployment inside one process.
//!
//! All listeners are bound before any node starts, then every node runs as
//! its own task. Instead of waiting a fixed time for the traversal to finish,
//! the orchestrator waits for each node's report and assembles the spanning
//! tree from them. The wait is bounded: nodes that have not reported when the
//! deadline passes are aborted and named in [`NodeError::Timeout`].

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use canopy_core::{NodeAddr, SpanningTree, UniformRandom};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::{ConfigError, NodeConfig, NodeError, NodeRuntime, SystemEnv, TcpTransport};

/// Load every `*.yaml` / `*.yml` file in `dir`, sorted by file name.
///
/// # Errors
///
/// Returns the first [`ConfigError`] encountered.
pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<(PathBuf, NodeConfig)>, ConfigError> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir)
        .map_err(|source| ConfigError::Io { path: dir.to_path_buf(), source })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path =
            entry.map_err(|source| ConfigError::Io { path: dir.to_path_buf(), source })?.path();
        let is_yaml = path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml");
        if is_yaml && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| NodeConfig::load(&path).map(|config| (path, config)))
        .collect()
}

/// Check that a set of node configurations can run together.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if addresses repeat, ports differ, the
/// root is missing, or a neighbour is not among the configured nodes.
pub fn validate_cluster(configs: &[NodeConfig], root: NodeAddr) -> Result<(), ConfigError> {
    let mut addrs = BTreeSet::new();
    for config in configs {
        if !addrs.insert(config.addr()) {
            return Err(ConfigError::Invalid(format!("address {} is used twice", config.address)));
        }
    }

    if !addrs.contains(&root) {
        return Err(ConfigError::Invalid(format!("root {root} is not a configured node")));
    }

    if let Some(first) = configs.first() {
        if let Some(other) = configs.iter().find(|c| c.port != first.port) {
            return Err(ConfigError::Invalid(format!(
                "nodes {} and {} use different ports",
                first.id, other.id
            )));
        }
    }

    for config in configs {
        let unknown =
            config.neighbours.iter().find(|n| !addrs.contains(&NodeAddr::from(n.address)));
        if let Some(n) = unknown {
            return Err(ConfigError::Invalid(format!(
                "node {} has unknown neighbour {}",
                config.id, n.address
            )));
        }
    }

    Ok(())
}

/// Run a whole deployment and return the verified spanning tree.
///
/// # Errors
///
/// Fails if the cluster is misconfigured, a listener cannot be bound, any node
/// fails, some node has not reported within `timeout`, or the reports do not
/// form a spanning tree over all nodes.
pub async fn launch(
    configs: Vec<NodeConfig>,
    root: NodeAddr,
    start_delay: Duration,
    timeout: Duration,
) -> Result<SpanningTree, NodeError> {
    validate_cluster(&configs, root)?;

    let mut bound = Vec::with_capacity(configs.len());
    for config in &configs {
        let identity = config.identity()?;
        let transport = TcpTransport::bind(config.addr(), config.port).await.map_err(|source| {
            NodeError::Bind { addr: config.addr().socket_addr(config.port), source }
        })?;
        bound.push((identity, transport));
    }

    info!(nodes = bound.len(), root = %root, "All listeners bound, starting nodes");

    let mut nodes = JoinSet::new();
    for (identity, transport) in bound {
        let is_root = identity.addr == root;
        let runtime =
            NodeRuntime::new(identity, is_root, transport, SystemEnv, UniformRandom::new(SystemEnv))
                .with_start_delay(start_delay);
        nodes.spawn(runtime.run());
    }

    let mut reports = Vec::with_capacity(configs.len());
    let collect = async {
        while let Some(joined) = nodes.join_next().await {
            reports.push(joined??);
        }
        Ok::<_, NodeError>(())
    };
    if let Ok(collected) = tokio::time::timeout(timeout, collect).await {
        collected?;
    } else {
        nodes.abort_all();
        let reported: BTreeSet<_> = reports.iter().map(|r| r.node).collect();
        let missing: Vec<_> =
            configs.iter().map(NodeConfig::addr).filter(|a| !reported.contains(a)).collect();
        warn!(missing = missing.len(), ?timeout, "Deadline passed before all nodes reported");
        return Err(NodeError::Timeout { missing });
    }

    let tree = SpanningTree::from_reports(reports)?;
    tree.verify_covers(configs.iter().map(NodeConfig::addr))?;

    info!(nodes = tree.len(), depth = tree.depth(), "Spanning tree complete");
    Ok(tree)
}
