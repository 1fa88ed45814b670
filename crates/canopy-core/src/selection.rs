//! Neighbour selection policies.
//!
//! The state machine asks a policy which unexplored neighbour to probe next.
//! Correctness of the spanning tree does not depend on the order, only on
//! every neighbour eventually being tried exactly once, so policies are free
//! to be random, deterministic or weighted.

use crate::{Neighbour, env::Environment};

/// Chooses the next neighbour to probe.
pub trait SelectionPolicy {
    /// Returns an index into `candidates`.
    ///
    /// `candidates` is never empty and is ordered by address. Returning an
    /// index out of range makes the state machine fail with
    /// [`ExplorationError::InvalidSelection`](crate::ExplorationError::InvalidSelection).
    fn choose(&mut self, candidates: &[Neighbour]) -> usize;
}

impl<P: SelectionPolicy + ?Sized> SelectionPolicy for &mut P {
    fn choose(&mut self, candidates: &[Neighbour]) -> usize {
        (**self).choose(candidates)
    }
}

/// Uniformly random choice driven by the environment's RNG.
#[derive(Debug, Clone)]
pub struct UniformRandom<E> {
    env: E,
}

impl<E: Environment> UniformRandom<E> {
    /// Create a policy drawing from `env`.
    pub fn new(env: E) -> Self {
        Self { env }
    }
}

impl<E: Environment> SelectionPolicy for UniformRandom<E> {
    fn choose(&mut self, candidates: &[Neighbour]) -> usize {
        self.env.random_index(candidates.len())
    }
}

/// Deterministic choice of the lightest edge, ties broken by address.
///
/// The DFS does not need weights; this policy exists so configurations with
/// meaningful weights produce reproducible, weight-guided trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightestEdge;

impl SelectionPolicy for LightestEdge {
    fn choose(&mut self, candidates: &[Neighbour]) -> usize {
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, candidate)| (candidate.weight, candidate.addr))
            .map_or(0, |(index, _)| index)
    }
}
