//! Turmoil-based Transport implementation.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
};

use async_trait::async_trait;
use canopy_core::{NodeAddr, transport::Transport};
use turmoil::net::{TcpListener, TcpStream};

/// Simulation transport over Turmoil's deterministic TCP.
///
/// Each simulated host has exactly one IP address and every connection it
/// opens originates from it, which is what the protocol needs to identify
/// senders. The host must be registered under the node's own address.
pub struct SimTransport {
    listener: TcpListener,
    local: NodeAddr,
    port: u16,
}

impl SimTransport {
    /// Listen on `port` for the node `local`.
    ///
    /// Must be called from inside the simulated host registered as `local`.
    ///
    /// # Errors
    ///
    /// Returns error if the port is already bound on this host.
    pub async fn bind(local: NodeAddr, port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?;
        Ok(Self { listener, local, port })
    }
}

#[async_trait]
impl Transport for SimTransport {
    type SendStream = TcpStream;
    type RecvStream = TcpStream;

    fn local_addr(&self) -> NodeAddr {
        self.local
    }

    async fn accept(&self) -> io::Result<(NodeAddr, Self::RecvStream)> {
        let (stream, origin) = self.listener.accept().await?;
        Ok((NodeAddr::from(origin), stream))
    }

    async fn connect(&self, to: NodeAddr) -> io::Result<Self::SendStream> {
        TcpStream::connect(to.socket_addr(self.port)).await
    }
}
