//! Error types for the Canopy protocol core.
//!
//! This module provides strongly-typed errors for different layers:
//! - Directory errors (invalid neighbour lists, fatal at startup)
//! - Exploration errors (violated protocol preconditions)
//! - Tree errors (reports that do not form a spanning tree)
//!
//! Every exploration error means a precondition of the algorithm was broken:
//! a neighbour map mismatch, a duplicated message or a message after
//! termination. None of them is recoverable.

use canopy_proto::Message;
use thiserror::Error;

use crate::NodeAddr;

/// Invalid neighbour configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// A node lists itself as a neighbour
    #[error("node {0} lists itself as a neighbour")]
    SelfLoop(NodeAddr),

    /// The same neighbour is listed twice
    #[error("neighbour {0} is listed more than once")]
    DuplicateNeighbour(NodeAddr),
}

/// Protocol invariant violations detected by the exploration state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExplorationError {
    /// Message from an address absent from the neighbour directory
    #[error("received {message} from {from}, which is not a neighbour")]
    UnknownNeighbour {
        /// Sender of the message
        from: NodeAddr,
        /// Message kind
        message: Message,
    },

    /// Response from a neighbour this node is not waiting on
    #[error("received {message} from {from} while awaiting {awaiting:?}")]
    UnexpectedResponse {
        /// Sender of the response
        from: NodeAddr,
        /// Response kind
        message: Message,
        /// Neighbour with the outstanding probe, if any
        awaiting: Option<NodeAddr>,
    },

    /// Accept from a neighbour that already probed this node
    #[error("{from} accepted a probe after probing this node itself")]
    ConflictingAccept {
        /// Sender of the accept
        from: NodeAddr,
    },

    /// Probe from the parent or from a child
    #[error("received probe from tree neighbour {from}")]
    UnexpectedProbe {
        /// Sender of the probe
        from: NodeAddr,
    },

    /// Second probe from the same neighbour
    #[error("duplicate probe from {from}")]
    DuplicateProbe {
        /// Sender of the probe
        from: NodeAddr,
    },

    /// Message delivered after the node terminated
    #[error("received {message} from {from} after termination")]
    Terminated {
        /// Sender of the message
        from: NodeAddr,
        /// Message kind
        message: Message,
    },

    /// Kickoff on a non-root node
    #[error("only the root can start the traversal")]
    NotRoot,

    /// Kickoff issued twice
    #[error("traversal already started")]
    AlreadyStarted,

    /// Selection policy returned an index outside the candidate list
    #[error("selection policy chose index {index} of {candidates} candidates")]
    InvalidSelection {
        /// Index returned by the policy
        index: usize,
        /// Number of candidates offered
        candidates: usize,
    },

    /// Internal set bookkeeping is inconsistent
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

/// Reports that cannot be assembled into a single spanning tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// No report came from a root
    #[error("no root report")]
    NoRoot,

    /// More than one report claims to be the root
    #[error("multiple roots: {0} and {1}")]
    MultipleRoots(NodeAddr, NodeAddr),

    /// Two reports for the same node
    #[error("duplicate report for {0}")]
    DuplicateReport(NodeAddr),

    /// Non-root report without a parent
    #[error("{0} has no parent")]
    MissingParent(NodeAddr),

    /// A report references a node that did not report
    #[error("{node} references unknown node {unknown}")]
    UnknownNode {
        /// Reporting node
        node: NodeAddr,
        /// Address with no report
        unknown: NodeAddr,
    },

    /// Parent and child disagree about their edge
    #[error("{parent} and {child} disagree about their tree edge")]
    ParentMismatch {
        /// Claimed parent
        parent: NodeAddr,
        /// Claimed child
        child: NodeAddr,
    },

    /// A node is not reachable from the root (cycle or forest)
    #[error("{0} is not reachable from the root")]
    Unreachable(NodeAddr),

    /// An expected node has no report
    #[error("no report from {0}")]
    MissingNode(NodeAddr),
}
