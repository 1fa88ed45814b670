//! Oracle functions for scenario verification.
//!
//! Oracle functions run at the end of scenarios to verify global consistency.
//! They receive the final world state and check invariants.

use std::collections::BTreeSet;

use canopy_core::NodeAddr;
use canopy_proto::Message;

use crate::scenario::World;

/// Oracle function type.
///
/// Receives immutable reference to world state and returns:
/// - `Ok(())` if all invariants hold
/// - `Err(message)` if verification fails
pub type OracleFn = Box<dyn FnOnce(&World) -> Result<(), String>>;

/// No node raised a protocol error.
pub fn no_errors() -> OracleFn {
    Box::new(|world| match world.failures().first() {
        None => Ok(()),
        Some(failure) => Err(format!("{} failed: {}", failure.node, failure.error)),
    })
}

/// Every node terminated.
pub fn all_terminated() -> OracleFn {
    Box::new(|world| {
        if world.all_terminated() {
            Ok(())
        } else {
            let pending: Vec<_> = world
                .explorers()
                .filter(|e| e.report().is_none())
                .map(|e| e.addr().to_string())
                .collect();
            Err(format!("nodes did not terminate: {}", pending.join(", ")))
        }
    })
}

/// The reports form exactly one spanning tree over all nodes.
pub fn spanning_tree() -> OracleFn {
    Box::new(|world| world.tree().map(|_| ()).map_err(|e| format!("not a spanning tree: {e}")))
}

/// Every node classified all of its neighbours: nothing unexplored, children
/// and rejected disjoint, and together with the parent they cover the
/// neighbour set.
pub fn partitions_complete() -> OracleFn {
    Box::new(|world| {
        for explorer in world.explorers() {
            let node = explorer.addr();
            explorer.check_invariants().map_err(|e| format!("{node}: {e}"))?;

            if !explorer.unexplored().is_empty() || explorer.awaiting().is_some() {
                return Err(format!("{node} still has unexplored neighbours"));
            }
            if !explorer.children().is_disjoint(explorer.rejected()) {
                return Err(format!("{node} has a neighbour that is both child and rejected"));
            }

            let mut covered: BTreeSet<NodeAddr> =
                explorer.children().union(explorer.rejected()).copied().collect();
            covered.extend(explorer.parent());
            let neighbours: BTreeSet<NodeAddr> = explorer.identity().neighbours.addrs().collect();
            if covered != neighbours {
                return Err(format!("{node} classified {covered:?}, neighbours are {neighbours:?}"));
            }
        }
        Ok(())
    })
}

/// No node probed the same neighbour twice.
pub fn probes_unique() -> OracleFn {
    Box::new(|world| {
        let mut seen = BTreeSet::new();
        for probe in world.probes() {
            if !seen.insert(*probe) {
                return Err(format!("{} probed {} twice", probe.0, probe.1));
            }
        }
        Ok(())
    })
}

/// Every edge was probed exactly once: tree edges answered with `Accept`,
/// the rest with `Reject`.
pub fn message_complexity() -> OracleFn {
    Box::new(|world| {
        let edges = world.topology().edge_count();
        let tree_edges = world.topology().len().saturating_sub(1);
        let expected = [
            (Message::Probe, edges),
            (Message::Accept, tree_edges),
            (Message::Reject, edges - tree_edges),
        ];

        for (message, count) in expected {
            let sent = world.sent(message);
            if sent != count {
                return Err(format!("{sent} {message} messages sent, expected {count}"));
            }
        }
        Ok(())
    })
}

/// The tree is no deeper than `max`.
pub fn max_depth(max: usize) -> OracleFn {
    Box::new(move |world| {
        let depth = world.tree().map_err(|e| e.to_string())?.depth();
        if depth <= max { Ok(()) } else { Err(format!("tree depth {depth} exceeds {max}")) }
    })
}

/// The full set of checks for a successful traversal.
pub fn traversal_correct() -> OracleFn {
    all_of(vec![
        no_errors(),
        all_terminated(),
        partitions_complete(),
        probes_unique(),
        message_complexity(),
        spanning_tree(),
    ])
}

/// Combine multiple oracles into one.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| {
        for oracle in oracles {
            oracle(world)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Topology, scenario::Scenario};

    #[test]
    fn traversal_oracle_accepts_ring() {
        Scenario::new(Topology::ring(5)).seed(3).oracle(traversal_correct()).run().unwrap();
    }

    #[test]
    fn depth_oracle_rejects_deep_path() {
        let result = Scenario::new(Topology::path(5)).oracle(max_depth(2)).run();

        assert!(result.err().is_some_and(|e| e.contains("exceeds")));
    }

    #[test]
    fn all_of_stops_at_first_failure() {
        let first: OracleFn = Box::new(|_| Err("first".to_string()));
        let second: OracleFn = Box::new(|_| Err("second".to_string()));
        let oracle = all_of(vec![first, second]);

        let result = Scenario::new(Topology::isolated()).oracle(oracle).run();

        assert_eq!(result.err(), Some("first".to_string()));
    }
}
