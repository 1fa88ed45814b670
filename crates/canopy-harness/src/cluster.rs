//! Full node runtimes over Turmoil's simulated network.
//!
//! Every node of a [`Topology`] becomes a Turmoil client running a
//! [`NodeRuntime`] with [`SimTransport`] and [`SimEnv`]. The run ends when
//! every node has terminated; their reports are assembled into a
//! [`SpanningTree`].

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use canopy_core::{SpanningTree, TreeReport, UniformRandom};
use canopy_node::{DEFAULT_PORT, NodeRuntime};
use tracing::info;

use crate::{SimEnv, SimTransport, Topology};

/// Multi-node simulation builder.
pub struct Cluster {
    topology: Topology,
    root: usize,
    seed: u64,
    start_delay: Duration,
    duration: Duration,
}

impl Cluster {
    /// Simulate `topology` rooted at node 0.
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            root: 0,
            seed: 0,
            start_delay: Duration::from_millis(100),
            duration: Duration::from_secs(60),
        }
    }

    /// Start the traversal from node `index`.
    pub fn root(mut self, index: usize) -> Self {
        self.root = index;
        self
    }

    /// Seed for Turmoil and every node's selection policy.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Virtual time the root waits before its first probe.
    pub fn start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Virtual time limit for the whole run.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Run every node to termination and assemble the tree.
    ///
    /// # Errors
    ///
    /// Returns a description if any node fails, the simulation times out, or
    /// the reports do not form a spanning tree.
    pub fn run(self) -> Result<SpanningTree, String> {
        let mut sim = turmoil::Builder::new()
            .simulation_duration(self.duration)
            .rng_seed(self.seed)
            .build();

        let reports: Arc<Mutex<Vec<TreeReport>>> = Arc::new(Mutex::new(Vec::new()));

        for index in 0..self.topology.len() {
            let addr = self.topology.addr(index);
            let identity = self.topology.identity(index);
            let is_root = index == self.root;
            let env = SimEnv::with_seed(self.seed.wrapping_add(index as u64));
            let start_delay = self.start_delay;
            let reports = Arc::clone(&reports);

            sim.client(addr.ip(), async move {
                let transport = SimTransport::bind(addr, DEFAULT_PORT).await?;
                let policy = UniformRandom::new(env.clone());
                let runtime = NodeRuntime::new(identity, is_root, transport, env, policy)
                    .with_start_delay(start_delay);

                let report = runtime.run().await?;
                reports.lock().unwrap_or_else(PoisonError::into_inner).push(report);
                Ok(())
            });
        }

        sim.run().map_err(|e| format!("simulation failed: {e}"))?;

        let reports = std::mem::take(&mut *reports.lock().unwrap_or_else(PoisonError::into_inner));
        let tree = SpanningTree::from_reports(reports).map_err(|e| e.to_string())?;
        tree.verify_covers(self.topology.addrs()).map_err(|e| e.to_string())?;

        info!(nodes = tree.len(), depth = tree.depth(), "Cluster built spanning tree");
        Ok(tree)
    }
}
