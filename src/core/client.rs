//! Transport-level view of the peer connection.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Socket address of one end of a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketAddress {
    /// IP socket with port.
    Internet(SocketAddr),
    /// Unix-domain socket (path or opaque name, no port).
    Unix(String),
}

impl SocketAddress {
    /// Host part as string (IP or unix path).
    pub fn address(&self) -> String {
        match self {
            SocketAddress::Internet(addr) => addr.ip().to_string(),
            SocketAddress::Unix(path) => path.clone(),
        }
    }

    /// Port for internet sockets.
    #[inline]
    pub fn port(&self) -> Option<u16> {
        match self {
            SocketAddress::Internet(addr) => Some(addr.port()),
            SocketAddress::Unix(_) => None,
        }
    }

    /// IP address for internet sockets.
    #[inline]
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            SocketAddress::Internet(addr) => Some(addr.ip()),
            SocketAddress::Unix(_) => None,
        }
    }

    /// `network.transport` value.
    #[inline]
    pub fn transport(&self) -> &'static str {
        match self {
            SocketAddress::Internet(_) => "tcp",
            SocketAddress::Unix(_) => "unix",
        }
    }
}

impl From<SocketAddr> for SocketAddress {
    fn from(addr: SocketAddr) -> Self {
        SocketAddress::Internet(addr)
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketAddress::Internet(addr) => write!(f, "{}", addr),
            SocketAddress::Unix(path) => write!(f, "unix:{}", path),
        }
    }
}

/// Connection the request arrived on.
#[derive(Clone, Debug, Default)]
pub struct Client {
    local: Option<SocketAddress>,
    remote: Option<SocketAddress>,
    encrypted: bool,
}

impl Client {
    pub fn new(local: SocketAddress, remote: SocketAddress) -> Self {
        Self {
            local: Some(local),
            remote: Some(remote),
            encrypted: false,
        }
    }

    /// Mark the connection as TLS.
    pub fn with_tls(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    #[inline]
    pub fn local_address(&self) -> Option<&SocketAddress> {
        self.local.as_ref()
    }

    #[inline]
    pub fn remote_address(&self) -> Option<&SocketAddress> {
        self.remote.as_ref()
    }

    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }
}
