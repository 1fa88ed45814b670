//! Exploration state machine for the depth-first spanning-tree traversal.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Methods accept the selection policy as a parameter (no stored RNG)
//! - Methods return `Result<Vec<ExplorerAction>, ExplorationError>`
//! - Driver code executes actions (send messages, stop the receive loop)
//!
//! # State Machine
//!
//! ```text
//! ┌───────────┐  Probe from j   ┌───────────┐  unexplored = ∅ and  ┌────────────┐
//! │ Unreached │────────────────>│ Exploring │─────────────────────>│ Terminated │
//! └───────────┘  parent = j     └───────────┘  parent notified     └────────────┘
//!                                 ↑     │
//!                   root kickoff  │     │ Accept/Reject: probe next neighbour
//!                 (parent = self) │     ↓
//! ```
//!
//! # Working Sets
//!
//! - `children` (F): neighbours that accepted this node as parent
//! - `rejected` (NF): neighbours whose edge stays out of the tree
//! - `unexplored` (NE): neighbours not yet probed and not yet heard from
//! - `awaiting`: the single neighbour with an outstanding probe
//!
//! Together with the parent edge these sets partition the neighbour set.
//! `unexplored` only shrinks and an address leaves it at most once.

use std::collections::BTreeSet;

use canopy_proto::Message;

use crate::{
    NodeAddr, NodeIdentity, error::ExplorationError, selection::SelectionPolicy, tree::TreeReport,
};

/// Actions returned by the exploration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorerAction {
    /// Send `message` to neighbour `to` without waiting for delivery
    Send {
        /// Destination neighbour
        to: NodeAddr,
        /// Message to deliver
        message: Message,
    },

    /// The node is done; stop the receive loop and publish the report
    Terminate,
}

/// Coarse state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorerState {
    /// Not yet reached by the traversal
    Unreached,
    /// Parent known, exploring neighbours
    Exploring,
    /// All neighbours explored and the parent notified
    Terminated,
}

/// Per-node exploration state.
///
/// Owned exclusively by the node's receive loop; nothing else mutates it.
#[derive(Debug, Clone)]
pub struct Explorer {
    identity: NodeIdentity,
    is_root: bool,
    /// `Some(self)` on the root: no upstream to notify
    parent: Option<NodeAddr>,
    children: BTreeSet<NodeAddr>,
    rejected: BTreeSet<NodeAddr>,
    unexplored: BTreeSet<NodeAddr>,
    awaiting: Option<NodeAddr>,
    started: bool,
    terminated: bool,
}

impl Explorer {
    /// Create the state for a node. Every neighbour starts unexplored.
    #[must_use]
    pub fn new(identity: NodeIdentity, is_root: bool) -> Self {
        let unexplored = identity.neighbours.addrs().collect();
        let parent = is_root.then_some(identity.addr);

        Self {
            identity,
            is_root,
            parent,
            children: BTreeSet::new(),
            rejected: BTreeSet::new(),
            unexplored,
            awaiting: None,
            started: false,
            terminated: false,
        }
    }

    /// This node's address.
    #[must_use]
    pub fn addr(&self) -> NodeAddr {
        self.identity.addr
    }

    /// This node's identity.
    #[must_use]
    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Whether this node is the traversal root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ExplorerState {
        if self.terminated {
            ExplorerState::Terminated
        } else if self.parent.is_some() {
            ExplorerState::Exploring
        } else {
            ExplorerState::Unreached
        }
    }

    /// Upstream neighbour. `None` for the root and for unreached nodes.
    #[must_use]
    pub fn parent(&self) -> Option<NodeAddr> {
        self.parent.filter(|parent| *parent != self.identity.addr)
    }

    /// Neighbours that accepted this node as parent.
    #[must_use]
    pub fn children(&self) -> &BTreeSet<NodeAddr> {
        &self.children
    }

    /// Neighbours whose edge is not part of the tree.
    #[must_use]
    pub fn rejected(&self) -> &BTreeSet<NodeAddr> {
        &self.rejected
    }

    /// Neighbours not yet probed or heard from.
    #[must_use]
    pub fn unexplored(&self) -> &BTreeSet<NodeAddr> {
        &self.unexplored
    }

    /// Neighbour with the outstanding probe, if any.
    #[must_use]
    pub fn awaiting(&self) -> Option<NodeAddr> {
        self.awaiting
    }

    /// Final contribution to the tree, available once terminated.
    #[must_use]
    pub fn report(&self) -> Option<TreeReport> {
        self.terminated.then(|| TreeReport {
            node: self.identity.addr,
            is_root: self.is_root,
            parent: self.parent(),
            children: self.children.clone(),
            rejected: self.rejected.clone(),
        })
    }

    /// Root kickoff: probe the first neighbour.
    ///
    /// A root without neighbours terminates immediately.
    ///
    /// # Errors
    ///
    /// - [`ExplorationError::NotRoot`] on a non-root node
    /// - [`ExplorationError::AlreadyStarted`] if called twice
    pub fn start(
        &mut self,
        policy: &mut impl SelectionPolicy,
    ) -> Result<Vec<ExplorerAction>, ExplorationError> {
        if !self.is_root {
            return Err(ExplorationError::NotRoot);
        }
        if self.started {
            return Err(ExplorationError::AlreadyStarted);
        }

        self.started = true;
        self.advance(policy)
    }

    /// Process a message received from neighbour `from` and return actions.
    ///
    /// # Errors
    ///
    /// Returns an [`ExplorationError`] when the message violates a protocol
    /// precondition. Such errors are fatal to the node.
    pub fn handle_message(
        &mut self,
        from: NodeAddr,
        message: Message,
        policy: &mut impl SelectionPolicy,
    ) -> Result<Vec<ExplorerAction>, ExplorationError> {
        if self.terminated {
            return Err(ExplorationError::Terminated { from, message });
        }
        if !self.identity.neighbours.contains(&from) {
            return Err(ExplorationError::UnknownNeighbour { from, message });
        }

        match message {
            Message::Probe => self.handle_probe(from, policy),
            Message::Accept | Message::Reject => self.handle_response(from, message, policy),
        }
    }

    fn handle_probe(
        &mut self,
        from: NodeAddr,
        policy: &mut impl SelectionPolicy,
    ) -> Result<Vec<ExplorerAction>, ExplorationError> {
        let Some(parent) = self.parent else {
            // First contact: `from` becomes the parent edge
            self.unexplored.remove(&from);
            self.parent = Some(from);
            self.started = true;
            return self.advance(policy);
        };

        if parent == from || self.children.contains(&from) {
            return Err(ExplorationError::UnexpectedProbe { from });
        }
        // A crossing probe from the neighbour we are probing is legitimate;
        // any other repeat is a duplicate
        if self.rejected.contains(&from) && self.awaiting != Some(from) {
            return Err(ExplorationError::DuplicateProbe { from });
        }

        self.unexplored.remove(&from);
        self.rejected.insert(from);

        Ok(vec![ExplorerAction::Send { to: from, message: Message::Reject }])
    }

    fn handle_response(
        &mut self,
        from: NodeAddr,
        message: Message,
        policy: &mut impl SelectionPolicy,
    ) -> Result<Vec<ExplorerAction>, ExplorationError> {
        if self.awaiting != Some(from) {
            return Err(ExplorationError::UnexpectedResponse {
                from,
                message,
                awaiting: self.awaiting,
            });
        }

        if message == Message::Accept {
            if self.rejected.contains(&from) {
                return Err(ExplorationError::ConflictingAccept { from });
            }
            self.children.insert(from);
        } else {
            self.rejected.insert(from);
        }
        self.awaiting = None;

        self.advance(policy)
    }

    /// Probe the next unexplored neighbour, or finish.
    fn advance(
        &mut self,
        policy: &mut impl SelectionPolicy,
    ) -> Result<Vec<ExplorerAction>, ExplorationError> {
        debug_assert!(self.awaiting.is_none(), "at most one outstanding probe");

        if let Some(next) = self.take_unexplored(policy)? {
            self.awaiting = Some(next);
            return Ok(vec![ExplorerAction::Send { to: next, message: Message::Probe }]);
        }

        self.terminated = true;

        let mut actions = Vec::with_capacity(2);
        if let Some(parent) = self.parent() {
            actions.push(ExplorerAction::Send { to: parent, message: Message::Accept });
        }
        actions.push(ExplorerAction::Terminate);

        Ok(actions)
    }

    fn take_unexplored(
        &mut self,
        policy: &mut impl SelectionPolicy,
    ) -> Result<Option<NodeAddr>, ExplorationError> {
        if self.unexplored.is_empty() {
            return Ok(None);
        }

        let candidates: Vec<_> = self
            .identity
            .neighbours
            .iter()
            .filter(|neighbour| self.unexplored.contains(&neighbour.addr))
            .collect();

        let index = policy.choose(&candidates);
        let chosen = candidates.get(index).ok_or(ExplorationError::InvalidSelection {
            index,
            candidates: candidates.len(),
        })?;

        self.unexplored.remove(&chosen.addr);
        Ok(Some(chosen.addr))
    }

    /// Verify the working sets partition the neighbour set.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorationError::InvariantViolated`] describing the first
    /// inconsistency found.
    pub fn check_invariants(&self) -> Result<(), ExplorationError> {
        let violated = |msg: String| Err(ExplorationError::InvariantViolated(msg));

        if let Some(addr) = self.children.intersection(&self.rejected).next() {
            return violated(format!("{addr} is both child and rejected"));
        }
        if let Some(addr) = self.unexplored.iter().find(|a| self.is_settled(a)) {
            return violated(format!("{addr} is unexplored and settled"));
        }

        let parent = self.parent();
        if let Some(parent) = parent {
            if self.is_settled(&parent) || self.unexplored.contains(&parent) {
                return violated(format!("parent {parent} appears in a working set"));
            }
        }
        if let Some(awaiting) = self.awaiting {
            if self.children.contains(&awaiting) || self.unexplored.contains(&awaiting) {
                return violated(format!("awaited {awaiting} is already classified"));
            }
        }

        for addr in self.identity.neighbours.addrs() {
            let covered = self.unexplored.contains(&addr)
                || self.is_settled(&addr)
                || self.awaiting == Some(addr)
                || parent == Some(addr);
            if !covered {
                return violated(format!("neighbour {addr} is in no set"));
            }
        }

        let mut known = self.children.iter().chain(&self.rejected).chain(&self.unexplored);
        if let Some(addr) = known.find(|a| !self.identity.neighbours.contains(a)) {
            return violated(format!("{addr} is not a neighbour"));
        }

        if self.terminated && !self.unexplored.is_empty() {
            return violated("terminated with unexplored neighbours".to_string());
        }

        Ok(())
    }

    fn is_settled(&self, addr: &NodeAddr) -> bool {
        self.children.contains(addr) || self.rejected.contains(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LightestEdge, Neighbour};

    fn addr(last: u8) -> NodeAddr {
        NodeAddr::v4(10, 0, 0, last)
    }

    fn node(id: u8, neighbours: &[u8]) -> NodeIdentity {
        NodeIdentity::unweighted(addr(id), neighbours.iter().map(|n| addr(*n))).unwrap()
    }

    fn send(to: u8, message: Message) -> ExplorerAction {
        ExplorerAction::Send { to: addr(to), message }
    }

    /// Always picks the first candidate (lowest address).
    struct First;

    impl SelectionPolicy for First {
        fn choose(&mut self, _candidates: &[Neighbour]) -> usize {
            0
        }
    }

    #[test]
    fn root_starts_exploring_with_self_as_parent() {
        let explorer = Explorer::new(node(1, &[2, 3]), true);

        assert_eq!(explorer.state(), ExplorerState::Exploring);
        assert_eq!(explorer.parent(), None);
        explorer.check_invariants().unwrap();
    }

    #[test]
    fn root_kickoff_probes_one_neighbour() {
        let mut root = Explorer::new(node(1, &[2, 3]), true);

        let actions = root.start(&mut First).unwrap();

        assert_eq!(actions, vec![send(2, Message::Probe)]);
        assert_eq!(root.awaiting(), Some(addr(2)));
        assert!(!root.unexplored().contains(&addr(2)));
        root.check_invariants().unwrap();
    }

    #[test]
    fn kickoff_only_on_root_and_only_once() {
        let mut leaf = Explorer::new(node(2, &[1]), false);
        assert_eq!(leaf.start(&mut First), Err(ExplorationError::NotRoot));

        let mut root = Explorer::new(node(1, &[2]), true);
        root.start(&mut First).unwrap();
        assert_eq!(root.start(&mut First), Err(ExplorationError::AlreadyStarted));
    }

    #[test]
    fn isolated_root_terminates_immediately() {
        let mut root = Explorer::new(node(1, &[]), true);

        let actions = root.start(&mut First).unwrap();

        assert_eq!(actions, vec![ExplorerAction::Terminate]);
        let report = root.report().unwrap();
        assert!(report.is_root);
        assert_eq!(report.parent, None);
        assert!(report.children.is_empty());
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn leaf_accepts_parent_and_terminates() {
        let mut leaf = Explorer::new(node(2, &[1]), false);
        assert_eq!(leaf.state(), ExplorerState::Unreached);

        let actions = leaf.handle_message(addr(1), Message::Probe, &mut First).unwrap();

        assert_eq!(actions, vec![send(1, Message::Accept), ExplorerAction::Terminate]);
        assert_eq!(leaf.state(), ExplorerState::Terminated);
        assert_eq!(leaf.parent(), Some(addr(1)));
        leaf.check_invariants().unwrap();
    }

    #[test]
    fn first_probe_sets_parent_and_continues_exploring() {
        let mut explorer = Explorer::new(node(2, &[1, 3, 4]), false);

        let actions = explorer.handle_message(addr(1), Message::Probe, &mut First).unwrap();

        assert_eq!(actions, vec![send(3, Message::Probe)]);
        assert_eq!(explorer.parent(), Some(addr(1)));
        assert_eq!(explorer.unexplored().iter().copied().collect::<Vec<_>>(), vec![addr(4)]);
        explorer.check_invariants().unwrap();
    }

    #[test]
    fn probe_after_parent_is_rejected_without_new_probe() {
        let mut explorer = Explorer::new(node(2, &[1, 3, 4]), false);
        explorer.handle_message(addr(1), Message::Probe, &mut First).unwrap();

        let actions = explorer.handle_message(addr(4), Message::Probe, &mut First).unwrap();

        assert_eq!(actions, vec![send(4, Message::Reject)]);
        assert!(explorer.rejected().contains(&addr(4)));
        assert!(explorer.unexplored().is_empty());
        assert_eq!(explorer.awaiting(), Some(addr(3)));
        explorer.check_invariants().unwrap();
    }

    #[test]
    fn responses_classify_neighbours_then_notify_parent() {
        let mut explorer = Explorer::new(node(2, &[1, 3, 4]), false);
        explorer.handle_message(addr(1), Message::Probe, &mut First).unwrap();

        let actions = explorer.handle_message(addr(3), Message::Accept, &mut First).unwrap();
        assert_eq!(actions, vec![send(4, Message::Probe)]);

        let actions = explorer.handle_message(addr(4), Message::Reject, &mut First).unwrap();
        assert_eq!(actions, vec![send(1, Message::Accept), ExplorerAction::Terminate]);

        let report = explorer.report().unwrap();
        assert_eq!(report.parent, Some(addr(1)));
        assert_eq!(report.children, BTreeSet::from([addr(3)]));
        assert_eq!(report.rejected, BTreeSet::from([addr(4)]));
        explorer.check_invariants().unwrap();
    }

    #[test]
    fn root_does_not_notify_anyone_on_termination() {
        let mut root = Explorer::new(node(1, &[2]), true);
        root.start(&mut First).unwrap();

        let actions = root.handle_message(addr(2), Message::Accept, &mut First).unwrap();

        assert_eq!(actions, vec![ExplorerAction::Terminate]);
        assert_eq!(root.report().unwrap().children, BTreeSet::from([addr(2)]));
    }

    #[test]
    fn crossing_probes_resolve_with_mutual_rejects() {
        // 2 and 3 are reached through different parents and probe each other
        let mut a = Explorer::new(node(2, &[1, 3]), false);
        let mut b = Explorer::new(node(3, &[4, 2]), false);

        let a_probe = a.handle_message(addr(1), Message::Probe, &mut First).unwrap();
        let b_probe = b.handle_message(addr(4), Message::Probe, &mut First).unwrap();
        assert_eq!(a_probe, vec![send(3, Message::Probe)]);
        assert_eq!(b_probe, vec![send(2, Message::Probe)]);

        // Each receives the other's probe while awaiting its own response
        let a_reply = a.handle_message(addr(3), Message::Probe, &mut First).unwrap();
        let b_reply = b.handle_message(addr(2), Message::Probe, &mut First).unwrap();
        assert_eq!(a_reply, vec![send(3, Message::Reject)]);
        assert_eq!(b_reply, vec![send(2, Message::Reject)]);

        // Then each receives the reject answering its own probe
        let a_done = a.handle_message(addr(3), Message::Reject, &mut First).unwrap();
        let b_done = b.handle_message(addr(2), Message::Reject, &mut First).unwrap();

        assert_eq!(a_done, vec![send(1, Message::Accept), ExplorerAction::Terminate]);
        assert_eq!(b_done, vec![send(4, Message::Accept), ExplorerAction::Terminate]);
        assert_eq!(a.parent(), Some(addr(1)));
        assert_eq!(b.parent(), Some(addr(4)));
        assert_eq!(a.rejected(), &BTreeSet::from([addr(3)]));
        assert_eq!(b.rejected(), &BTreeSet::from([addr(2)]));
        a.check_invariants().unwrap();
        b.check_invariants().unwrap();
    }

    #[test]
    fn probe_from_unknown_address_is_fatal() {
        let mut explorer = Explorer::new(node(2, &[1]), false);

        let err = explorer.handle_message(addr(9), Message::Probe, &mut First).unwrap_err();

        assert_eq!(
            err,
            ExplorationError::UnknownNeighbour { from: addr(9), message: Message::Probe }
        );
        assert_eq!(explorer.state(), ExplorerState::Unreached);
    }

    #[test]
    fn unsolicited_response_is_fatal() {
        let mut explorer = Explorer::new(node(2, &[1, 3, 4]), false);
        explorer.handle_message(addr(1), Message::Probe, &mut First).unwrap();

        let err = explorer.handle_message(addr(4), Message::Accept, &mut First).unwrap_err();

        assert_eq!(err, ExplorationError::UnexpectedResponse {
            from: addr(4),
            message: Message::Accept,
            awaiting: Some(addr(3)),
        });
    }

    #[test]
    fn duplicate_probe_is_fatal() {
        let mut explorer = Explorer::new(node(2, &[1, 3, 4]), false);
        explorer.handle_message(addr(1), Message::Probe, &mut First).unwrap();
        explorer.handle_message(addr(4), Message::Probe, &mut First).unwrap();

        let err = explorer.handle_message(addr(4), Message::Probe, &mut First).unwrap_err();
        assert_eq!(err, ExplorationError::DuplicateProbe { from: addr(4) });

        let err = explorer.handle_message(addr(1), Message::Probe, &mut First).unwrap_err();
        assert_eq!(err, ExplorationError::UnexpectedProbe { from: addr(1) });
    }

    #[test]
    fn accept_after_crossing_probe_is_fatal() {
        let mut explorer = Explorer::new(node(2, &[1, 3]), false);
        explorer.handle_message(addr(1), Message::Probe, &mut First).unwrap();
        explorer.handle_message(addr(3), Message::Probe, &mut First).unwrap();

        let err = explorer.handle_message(addr(3), Message::Accept, &mut First).unwrap_err();
        assert_eq!(err, ExplorationError::ConflictingAccept { from: addr(3) });
    }

    #[test]
    fn messages_after_termination_are_fatal() {
        let mut leaf = Explorer::new(node(2, &[1]), false);
        leaf.handle_message(addr(1), Message::Probe, &mut First).unwrap();

        let err = leaf.handle_message(addr(1), Message::Probe, &mut First).unwrap_err();
        assert_eq!(err, ExplorationError::Terminated { from: addr(1), message: Message::Probe });
    }

    #[test]
    fn out_of_range_selection_is_reported() {
        struct Broken;
        impl SelectionPolicy for Broken {
            fn choose(&mut self, candidates: &[Neighbour]) -> usize {
                candidates.len()
            }
        }

        let mut root = Explorer::new(node(1, &[2, 3]), true);
        let err = root.start(&mut Broken).unwrap_err();

        assert_eq!(err, ExplorationError::InvalidSelection { index: 2, candidates: 2 });
    }

    #[test]
    fn policy_sees_edge_weights() {
        let identity = NodeIdentity::new(addr(1), [
            Neighbour::new(addr(2), crate::EdgeWeight(9)),
            Neighbour::new(addr(3), crate::EdgeWeight(1)),
        ])
        .unwrap();
        let mut root = Explorer::new(identity, true);

        assert_eq!(root.start(&mut LightestEdge).unwrap(), vec![send(3, Message::Probe)]);
    }

    #[test]
    fn every_neighbour_is_probed_at_most_once() {
        struct Recording(Vec<NodeAddr>);
        impl SelectionPolicy for Recording {
            fn choose(&mut self, candidates: &[Neighbour]) -> usize {
                let index = candidates.len() - 1;
                self.0.push(candidates[index].addr);
                index
            }
        }

        let mut policy = Recording(Vec::new());
        let mut root = Explorer::new(node(1, &[2, 3, 4, 5]), true);
        let mut actions = root.start(&mut policy).unwrap();

        while let Some(ExplorerAction::Send { to, message: Message::Probe }) = actions.first() {
            actions = root.handle_message(*to, Message::Reject, &mut policy).unwrap();
        }

        let chosen: BTreeSet<_> = policy.0.iter().copied().collect();
        assert_eq!(policy.0.len(), 4);
        assert_eq!(chosen.len(), 4, "no neighbour chosen twice");
        assert_eq!(actions, vec![ExplorerAction::Terminate]);
    }
}
