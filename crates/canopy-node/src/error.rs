//! Error types for a running node.
//!
//! Every variant is fatal to the node that hits it. Nothing is retried and no
//! error is turned into a protocol message: a stuck or failed node simply
//! never reports.

use std::{io, net::SocketAddr};

use canopy_core::{DirectoryError, ExplorationError, NodeAddr, TreeError};
use canopy_proto::ProtocolError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that abort a node.
#[derive(Error, Debug)]
pub enum NodeError {
    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Neighbour list is invalid
    #[error("invalid neighbour directory: {0}")]
    Directory(#[from] DirectoryError),

    /// Listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: SocketAddr,
        /// Underlying error
        source: io::Error,
    },

    /// Listener failed while accepting
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// Inbound frame could not be read
    #[error("failed to read frame from {from}: {source}")]
    Receive {
        /// Sender of the frame
        from: NodeAddr,
        /// Underlying error
        source: io::Error,
    },

    /// Outbound message could not be delivered
    #[error("failed to send to {to}: {source}")]
    Send {
        /// Destination neighbour
        to: NodeAddr,
        /// Underlying error
        source: io::Error,
    },

    /// Inbound frame is malformed
    #[error("malformed frame: {0}")]
    Protocol(#[from] ProtocolError),

    /// Protocol precondition violated
    #[error("exploration failed: {0}")]
    Exploration(#[from] ExplorationError),

    /// Reports do not form a spanning tree
    #[error("invalid spanning tree: {0}")]
    Tree(#[from] TreeError),

    /// Some nodes never reported before the deadline
    #[error("timed out waiting for reports from {}", join_addrs(.missing))]
    Timeout {
        /// Nodes that never reported
        missing: Vec<NodeAddr>,
    },

    /// A background task panicked or was cancelled
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

fn join_addrs(addrs: &[NodeAddr]) -> String {
    addrs.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
