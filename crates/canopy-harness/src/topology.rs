//! Undirected test graphs.
//!
//! Nodes are numbered `0..n` and addressed consecutively from `192.168.0.1`,
//! which is also the order Turmoil hands out addresses in. Edges carry a
//! weight so weighted selection policies have something to work with.

use std::{
    collections::{BTreeMap, BTreeSet},
    net::Ipv4Addr,
};

use canopy_core::{EdgeWeight, Neighbour, NodeAddr, NodeIdentity};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

const BASE: u32 = u32::from_be_bytes([192, 168, 0, 1]);

/// An undirected, weighted graph without self loops or parallel edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    len: usize,
    edges: BTreeMap<(usize, usize), i64>,
}

impl Topology {
    /// `n` nodes and no edges.
    pub fn empty(n: usize) -> Self {
        Self { len: n, edges: BTreeMap::new() }
    }

    /// A single node with no neighbours.
    pub fn isolated() -> Self {
        Self::empty(1)
    }

    /// Build from an explicit edge list with unit weights.
    ///
    /// # Panics
    ///
    /// Panics on self loops or out-of-range endpoints.
    pub fn from_edges(n: usize, edges: &[(usize, usize)]) -> Self {
        let mut topology = Self::empty(n);
        for &(a, b) in edges {
            topology.add_edge(a, b, 1);
        }
        topology
    }

    /// Cycle `0 - 1 - ... - (n-1) - 0`.
    pub fn ring(n: usize) -> Self {
        let mut topology = Self::empty(n);
        for i in 0..n {
            topology.add_edge(i, (i + 1) % n, 1);
        }
        topology
    }

    /// Hub `0` connected to `leaves` leaves `1..=leaves`.
    pub fn star(leaves: usize) -> Self {
        let mut topology = Self::empty(leaves + 1);
        for leaf in 1..=leaves {
            topology.add_edge(0, leaf, 1);
        }
        topology
    }

    /// Line `0 - 1 - ... - (n-1)`.
    pub fn path(n: usize) -> Self {
        let mut topology = Self::empty(n);
        for i in 1..n {
            topology.add_edge(i - 1, i, 1);
        }
        topology
    }

    /// Every pair of nodes connected.
    pub fn complete(n: usize) -> Self {
        let mut topology = Self::empty(n);
        for a in 0..n {
            for b in a + 1..n {
                topology.add_edge(a, b, 1);
            }
        }
        topology
    }

    /// A random connected graph with `n` nodes and up to `extra` edges beyond
    /// a random spanning tree. Weights are drawn from `1..=10`.
    pub fn random_connected(n: usize, extra: usize, seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut topology = Self::empty(n);

        for node in 1..n {
            let attach = rng.gen_range(0..node);
            let weight = rng.gen_range(1..=10);
            topology.add_edge(attach, node, weight);
        }

        if n > 1 {
            for _ in 0..extra {
                let a = rng.gen_range(0..n);
                let b = rng.gen_range(0..n);
                let weight = rng.gen_range(1..=10);
                if a != b {
                    topology.add_edge(a, b, weight);
                }
            }
        }

        topology
    }

    /// Add (or reweight) the edge `a - b`.
    ///
    /// # Panics
    ///
    /// Panics on self loops or out-of-range endpoints.
    pub fn add_edge(&mut self, a: usize, b: usize, weight: i64) {
        assert!(a != b, "self loop on node {a}");
        assert!(a < self.len && b < self.len, "edge {a}-{b} outside 0..{}", self.len);
        self.edges.insert((a.min(b), a.max(b)), weight);
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Address of node `index`.
    pub fn addr(&self, index: usize) -> NodeAddr {
        let offset = u32::try_from(index).unwrap_or(u32::MAX);
        NodeAddr::from(Ipv4Addr::from(BASE.saturating_add(offset)))
    }

    /// Index of the node with address `addr`.
    pub fn index_of(&self, addr: NodeAddr) -> Option<usize> {
        (0..self.len).find(|i| self.addr(*i) == addr)
    }

    /// All node addresses in index order.
    pub fn addrs(&self) -> impl Iterator<Item = NodeAddr> + '_ {
        (0..self.len).map(|i| self.addr(i))
    }

    /// Neighbours of node `index` with their edge weights.
    pub fn neighbours(&self, index: usize) -> Vec<Neighbour> {
        self.edges
            .iter()
            .filter_map(|(&(a, b), &weight)| {
                let other = if a == index {
                    b
                } else if b == index {
                    a
                } else {
                    return None;
                };
                Some(Neighbour::new(self.addr(other), EdgeWeight(weight)))
            })
            .collect()
    }

    /// Identity of node `index`.
    pub fn identity(&self, index: usize) -> NodeIdentity {
        // Edges are validated on insertion, so the directory is always valid
        match NodeIdentity::new(self.addr(index), self.neighbours(index)) {
            Ok(identity) => identity,
            Err(e) => unreachable!("topology produced invalid directory: {e}"),
        }
    }

    /// True if every node is reachable from node 0.
    pub fn is_connected(&self) -> bool {
        if self.len == 0 {
            return true;
        }

        let mut seen = BTreeSet::from([0]);
        let mut stack = vec![0];
        while let Some(node) = stack.pop() {
            for (&(a, b), _) in &self.edges {
                let next = match node {
                    n if n == a => b,
                    n if n == b => a,
                    _ => continue,
                };
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen.len() == self.len
    }
}
