//! Transport abstraction for network I/O.
//!
//! The protocol sends every message over its own short-lived connection:
//! connect, write one frame, close. The receiver identifies the sender by the
//! origin address of the connection, so the transport must bind outgoing
//! connections to the node's own address.
//!
//! # Implementations
//!
//! - **`TcpTransport`** (production, `canopy-node`): Tokio TCP sockets bound to
//!   the node's IP
//! - **`SimTransport`** (testing, `canopy-harness`): Turmoil's deterministic TCP
//!
//! # What We're NOT Testing
//!
//! - Message loss or node crashes (the protocol assumes a reliable network)
//! - Peer authentication
//!
//! # What We ARE Testing
//!
//! - Exploration state machine correctness under concurrent delivery
//! - Per-neighbour ordering of messages
//! - Framing of the three message kinds

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::NodeAddr;

/// Abstract transport delivering one message per connection.
///
/// # Ordering
///
/// `connect` resolves only once the connection is established, so two
/// connections opened one after the other by the same sender are accepted by
/// the receiver in that order. Drivers rely on this to keep messages to a
/// given neighbour in FIFO order.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Stream for writing one outbound frame.
    type SendStream: AsyncWrite + Unpin + Send + 'static;

    /// Stream for reading one inbound frame.
    type RecvStream: AsyncRead + Unpin + Send + 'static;

    /// Address this endpoint listens on and sends from.
    fn local_addr(&self) -> NodeAddr;

    /// Accepts an incoming connection.
    ///
    /// Returns the sender's address (derived from the connection origin) and
    /// the stream carrying its frame.
    ///
    /// # Errors
    ///
    /// Returns `std::io::Error` if the listener fails.
    async fn accept(&self) -> io::Result<(NodeAddr, Self::RecvStream)>;

    /// Opens a connection to neighbour `to`, originating from
    /// [`local_addr`](Transport::local_addr).
    ///
    /// # Errors
    ///
    /// Returns `std::io::Error` if the neighbour is unreachable or refuses the
    /// connection.
    async fn connect(&self, to: NodeAddr) -> io::Result<Self::SendStream>;
}
