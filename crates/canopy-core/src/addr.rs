//! Node addresses.

use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
};

/// Network identity of a node.
///
/// Nodes are identified by IP address only. Every node in a deployment listens
/// on the same port, so the IP of an inbound connection identifies the sender
/// without any payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddr(IpAddr);

impl NodeAddr {
    /// Create an address from an IP.
    #[must_use]
    pub const fn new(ip: IpAddr) -> Self {
        Self(ip)
    }

    /// Shorthand for an IPv4 address.
    #[must_use]
    pub const fn v4(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self(IpAddr::V4(Ipv4Addr::new(a, b, c, d)))
    }

    /// The underlying IP address.
    #[must_use]
    pub const fn ip(&self) -> IpAddr {
        self.0
    }

    /// Socket address of this node's listener on `port`.
    #[must_use]
    pub const fn socket_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.0, port)
    }
}

impl From<IpAddr> for NodeAddr {
    fn from(ip: IpAddr) -> Self {
        Self(ip)
    }
}

impl From<Ipv4Addr> for NodeAddr {
    fn from(ip: Ipv4Addr) -> Self {
        Self(IpAddr::V4(ip))
    }
}

impl From<SocketAddr> for NodeAddr {
    /// Drops the port: the sender of a connection is identified by IP alone.
    fn from(addr: SocketAddr) -> Self {
        Self(addr.ip())
    }
}

impl FromStr for NodeAddr {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<IpAddr>().map(Self)
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
