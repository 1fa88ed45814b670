//! World state for scenario execution.
//!
//! The World holds one [`Explorer`] per node and the messages in flight
//! between them. Each ordered pair of nodes has its own FIFO channel, which
//! mirrors the per-destination send lanes of the real runtime: messages from
//! one node to another arrive in the order they were sent, while messages on
//! different channels interleave freely.

use std::collections::{BTreeMap, VecDeque};

use canopy_core::{
    ExplorationError, Explorer, ExplorerAction, ExplorerState, LightestEdge, Neighbour, NodeAddr,
    SelectionPolicy, SpanningTree, TreeError, TreeReport, UniformRandom,
};
use canopy_proto::Message;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use crate::{SimEnv, Topology};

/// How nodes pick the next neighbour to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
    /// Uniformly random, seeded per node from the scenario seed
    #[default]
    Uniform,
    /// Lightest edge first
    Lightest,
}

/// A node's selection policy inside the world.
pub(crate) enum NodePolicy {
    Uniform(UniformRandom<SimEnv>),
    Lightest(LightestEdge),
}

impl NodePolicy {
    pub(crate) fn new(kind: PolicyKind, seed: u64) -> Self {
        match kind {
            PolicyKind::Uniform => Self::Uniform(UniformRandom::new(SimEnv::with_seed(seed))),
            PolicyKind::Lightest => Self::Lightest(LightestEdge),
        }
    }
}

impl SelectionPolicy for NodePolicy {
    fn choose(&mut self, candidates: &[Neighbour]) -> usize {
        match self {
            Self::Uniform(policy) => policy.choose(candidates),
            Self::Lightest(policy) => policy.choose(candidates),
        }
    }
}

/// A protocol error raised by one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    /// Node that raised the error
    pub node: NodeAddr,
    /// The error
    pub error: ExplorationError,
}

struct Node {
    explorer: Explorer,
    policy: NodePolicy,
    failed: bool,
}

/// Every node of a scenario plus the network between them.
pub struct World {
    topology: Topology,
    nodes: BTreeMap<NodeAddr, Node>,
    channels: BTreeMap<(NodeAddr, NodeAddr), VecDeque<Message>>,
    scheduler: ChaCha20Rng,
    probes: Vec<(NodeAddr, NodeAddr)>,
    sent: BTreeMap<Message, usize>,
    delivered: usize,
    collisions: usize,
    failures: Vec<NodeFailure>,
    terminations: Vec<NodeAddr>,
}

impl World {
    /// Create a world for `topology` with `root` as traversal root.
    ///
    /// `seed` drives both the delivery order and every node's policy.
    pub(crate) fn new(topology: Topology, root: usize, kind: PolicyKind, seed: u64) -> Self {
        let nodes = (0..topology.len())
            .map(|i| {
                let identity = topology.identity(i);
                let node_seed = seed ^ (i as u64 + 1).wrapping_mul(0x9E37_79B9);
                let policy = NodePolicy::new(kind, node_seed);
                let explorer = Explorer::new(identity, i == root);
                let node = Node { explorer, policy, failed: false };
                (topology.addr(i), node)
            })
            .collect();

        Self {
            topology,
            nodes,
            channels: BTreeMap::new(),
            scheduler: ChaCha20Rng::seed_from_u64(seed),
            probes: Vec::new(),
            sent: BTreeMap::new(),
            delivered: 0,
            collisions: 0,
            failures: Vec::new(),
            terminations: Vec::new(),
        }
    }

    /// Kick off the traversal at `root`.
    pub(crate) fn start(&mut self, root: NodeAddr) {
        let Some(node) = self.nodes.get_mut(&root) else {
            return;
        };
        let result = node.explorer.start(&mut node.policy);
        self.apply(root, result);
    }

    /// Deliver one in-flight message chosen by the scheduler.
    ///
    /// Returns `false` once nothing is in flight.
    pub(crate) fn step(&mut self) -> bool {
        let ready: Vec<(NodeAddr, NodeAddr)> = self
            .channels
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(pair, _)| *pair)
            .collect();
        if ready.is_empty() {
            return false;
        }

        let (from, to) = ready[self.scheduler.gen_range(0..ready.len())];
        let Some(message) = self.channels.get_mut(&(from, to)).and_then(VecDeque::pop_front) else {
            return false;
        };
        self.delivered += 1;

        let Some(node) = self.nodes.get_mut(&to) else {
            return true;
        };
        if node.failed {
            return true;
        }

        if message == Message::Probe && node.explorer.state() != ExplorerState::Unreached {
            self.collisions += 1;
        }

        debug!(%from, %to, %message, "Deliver");
        let result = node.explorer.handle_message(from, message, &mut node.policy);
        self.apply(to, result);
        true
    }

    fn apply(&mut self, node: NodeAddr, result: Result<Vec<ExplorerAction>, ExplorationError>) {
        let actions = match result {
            Ok(actions) => actions,
            Err(error) => {
                debug!(%node, %error, "Node failed");
                if let Some(state) = self.nodes.get_mut(&node) {
                    state.failed = true;
                }
                self.failures.push(NodeFailure { node, error });
                return;
            },
        };

        for action in actions {
            match action {
                ExplorerAction::Send { to, message } => {
                    if message == Message::Probe {
                        self.probes.push((node, to));
                    }
                    *self.sent.entry(message).or_default() += 1;
                    self.channels.entry((node, to)).or_default().push_back(message);
                },
                ExplorerAction::Terminate => self.terminations.push(node),
            }
        }
    }

    /// The simulated graph.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Explorer of `node`.
    pub fn explorer(&self, node: &NodeAddr) -> Option<&Explorer> {
        self.nodes.get(node).map(|n| &n.explorer)
    }

    /// All explorers, ordered by address.
    pub fn explorers(&self) -> impl Iterator<Item = &Explorer> {
        self.nodes.values().map(|n| &n.explorer)
    }

    /// True if every node reached [`ExplorerState::Terminated`].
    pub fn all_terminated(&self) -> bool {
        self.explorers().all(|e| e.state() == ExplorerState::Terminated)
    }

    /// Reports of all terminated nodes.
    pub fn reports(&self) -> Vec<TreeReport> {
        self.explorers().filter_map(Explorer::report).collect()
    }

    /// Assemble the spanning tree from the reports.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError`] if the reports do not form a spanning tree of the
    /// whole topology.
    pub fn tree(&self) -> Result<SpanningTree, TreeError> {
        let tree = SpanningTree::from_reports(self.reports())?;
        tree.verify_covers(self.topology.addrs())?;
        Ok(tree)
    }

    /// Every probe sent, in order, as `(from, to)`.
    pub fn probes(&self) -> &[(NodeAddr, NodeAddr)] {
        &self.probes
    }

    /// Number of `message`s sent by all nodes.
    pub fn sent(&self, message: Message) -> usize {
        self.sent.get(&message).copied().unwrap_or(0)
    }

    /// Number of messages delivered.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Number of probes that reached a node already in the tree.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Protocol errors raised by nodes.
    pub fn failures(&self) -> &[NodeFailure] {
        &self.failures
    }

    /// Nodes in the order they terminated.
    pub fn terminations(&self) -> &[NodeAddr] {
        &self.terminations
    }

    /// Messages still queued.
    pub fn in_flight(&self) -> usize {
        self.channels.values().map(VecDeque::len).sum()
    }
}
