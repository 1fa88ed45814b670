//! Tokio TCP transport.
//!
//! Every node listens on `address:port`. Outgoing connections are bound to
//! the node's own address before connecting, so the receiver sees the
//! sender's node address as the connection origin.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use canopy_core::{NodeAddr, transport::Transport};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

/// TCP transport for one node.
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
    local: NodeAddr,
    port: u16,
}

impl TcpTransport {
    /// Binds the node's listener on `addr:port`.
    ///
    /// # Errors
    ///
    /// Returns error if the address is in use or not assigned to this host.
    pub async fn bind(addr: NodeAddr, port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind(addr.socket_addr(port)).await?;
        Ok(Self { listener, local: addr, port })
    }

    /// The bound listener address.
    ///
    /// # Errors
    ///
    /// Returns error if the socket has been closed.
    pub fn listen_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

#[async_trait]
impl Transport for TcpTransport {
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
        let socket =
            if self.local.ip().is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };

        // Ephemeral port on our own address: the peer identifies us by IP
        socket.bind(SocketAddr::new(self.local.ip(), 0))?;
        socket.connect(to.socket_addr(self.port)).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn connection_origin_identifies_sender() {
        let local = NodeAddr::v4(127, 0, 0, 1);
        let receiver = TcpTransport::bind(local, 0).await.unwrap();
        let port = receiver.listen_addr().unwrap().port();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let sender = TcpTransport { listener, local, port };

        let send = async {
            let mut stream = sender.connect(local).await.unwrap();
            stream.write_all(b"CN").await.unwrap();
            stream.shutdown().await.unwrap();
        };
        let recv = async {
            let (from, mut stream) = receiver.accept().await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            (from, buf)
        };

        let ((), (from, buf)) = tokio::join!(send, recv);
        assert_eq!(from, local);
        assert_eq!(buf, b"CN");
    }
}
