//! Static neighbour directory.
//!
//! Each node knows only its direct neighbours. The directory is built once at
//! startup and never changes; the exploration state machine derives its
//! working sets from it.

use std::{collections::BTreeMap, fmt};

use crate::{NodeAddr, error::DirectoryError};

/// Weight of the edge to a neighbour.
///
/// The depth-first traversal ignores weights. They are kept as opaque
/// metadata so weighted selection policies (see
/// [`LightestEdge`](crate::LightestEdge)) can use them without changing the
/// state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeWeight(pub i64);

impl fmt::Display for EdgeWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A neighbour together with the weight of the connecting edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbour {
    /// Address of the neighbour
    pub addr: NodeAddr,
    /// Weight of the edge to the neighbour
    pub weight: EdgeWeight,
}

impl Neighbour {
    /// Create a neighbour entry.
    #[must_use]
    pub const fn new(addr: NodeAddr, weight: EdgeWeight) -> Self {
        Self { addr, weight }
    }
}

/// Immutable mapping from neighbour address to edge metadata.
///
/// Iteration is ordered by address, which keeps every derived set and every
/// selection deterministic for a given RNG stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighbourDirectory {
    edges: BTreeMap<NodeAddr, EdgeWeight>,
}

impl NeighbourDirectory {
    /// Build the directory for `owner`.
    ///
    /// # Errors
    ///
    /// - [`DirectoryError::SelfLoop`] if `owner` lists itself
    /// - [`DirectoryError::DuplicateNeighbour`] if an address appears twice
    pub fn new(
        owner: NodeAddr,
        neighbours: impl IntoIterator<Item = Neighbour>,
    ) -> Result<Self, DirectoryError> {
        let mut edges = BTreeMap::new();

        for neighbour in neighbours {
            if neighbour.addr == owner {
                return Err(DirectoryError::SelfLoop(owner));
            }
            if edges.insert(neighbour.addr, neighbour.weight).is_some() {
                return Err(DirectoryError::DuplicateNeighbour(neighbour.addr));
            }
        }

        Ok(Self { edges })
    }

    /// Whether `addr` is a direct neighbour.
    #[must_use]
    pub fn contains(&self, addr: &NodeAddr) -> bool {
        self.edges.contains_key(addr)
    }

    /// Weight of the edge to `addr`, if it is a neighbour.
    #[must_use]
    pub fn weight(&self, addr: &NodeAddr) -> Option<EdgeWeight> {
        self.edges.get(addr).copied()
    }

    /// Number of neighbours.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the node has no neighbours.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Neighbour addresses in ascending order.
    pub fn addrs(&self) -> impl Iterator<Item = NodeAddr> + '_ {
        self.edges.keys().copied()
    }

    /// Neighbours with their edge weights, in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = Neighbour> + '_ {
        self.edges.iter().map(|(addr, weight)| Neighbour::new(*addr, *weight))
    }
}

/// A node's address and its neighbour directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    /// This node's address
    pub addr: NodeAddr,
    /// This node's direct neighbours
    pub neighbours: NeighbourDirectory,
}

impl NodeIdentity {
    /// Build an identity, validating the neighbour list.
    ///
    /// # Errors
    ///
    /// See [`NeighbourDirectory::new`].
    pub fn new(
        addr: NodeAddr,
        neighbours: impl IntoIterator<Item = Neighbour>,
    ) -> Result<Self, DirectoryError> {
        Ok(Self { addr, neighbours: NeighbourDirectory::new(addr, neighbours)? })
    }

    /// Identity with unit edge weights.
    ///
    /// # Errors
    ///
    /// See [`NeighbourDirectory::new`].
    pub fn unweighted(
        addr: NodeAddr,
        neighbours: impl IntoIterator<Item = NodeAddr>,
    ) -> Result<Self, DirectoryError> {
        Self::new(addr, neighbours.into_iter().map(|n| Neighbour::new(n, EdgeWeight(1))))
    }
}
