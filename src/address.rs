//! Server and client address resolution.
//!
//! Shared by the tracing and metrics handlers so both report the same
//! `server.address`/`server.port` and `client.address`/`client.port`.
//!
//! Server precedence: forwarded `host` > `:authority` > `Host` > local
//! socket. A host that does not parse as an authority counts as absent.
//! An authority without a port gets the scheme default (443 for `https`,
//! 80 for `http`).
//!
//! Client precedence: forwarded `for` node > remote socket. Unix-domain
//! sockets report the opaque path and no port.

use std::str::FromStr;

use http::uri::Authority;

use crate::core::{Request, SocketAddress};

/// Resolved address pair.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub address: Option<String>,
    pub port: Option<u16>,
}

impl Endpoint {
    fn from_socket(socket: &SocketAddress) -> Self {
        Self {
            address: Some(socket.address()),
            port: socket.port(),
        }
    }
}

/// Everything the telemetry handlers need to know about where a request
/// came from and where it was addressed to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedAddresses {
    pub server: Endpoint,
    pub client: Endpoint,
    pub url_scheme: String,
}

/// Resolve server, client and scheme for a request. Never fails.
pub fn resolve(request: &Request) -> ResolvedAddresses {
    ResolvedAddresses {
        server: server_endpoint(request),
        client: client_endpoint(request),
        url_scheme: request.scheme().to_string(),
    }
}

/// Host string as reported by the proxy or the client.
pub fn requested_host(request: &Request) -> Option<&str> {
    request
        .forwarded()
        .and_then(|f| f.host())
        .or_else(|| request.authority())
        .or_else(|| request.host())
}

/// Server address and port.
pub fn server_endpoint(request: &Request) -> Endpoint {
    if let Some((host, port)) = requested_host(request).and_then(parse_authority) {
        return Endpoint {
            address: Some(host),
            port: port.or_else(|| default_port(request.scheme())),
        };
    }

    match request.client().local_address() {
        Some(local @ SocketAddress::Internet(_)) => Endpoint::from_socket(local),
        _ => Endpoint::default(),
    }
}

/// Client address and port.
pub fn client_endpoint(request: &Request) -> Endpoint {
    if let Some(node) = request.forwarded().and_then(|f| f.client()) {
        return Endpoint {
            address: Some(node.ip.to_string()),
            port: node.port,
        };
    }

    request
        .client()
        .remote_address()
        .map(Endpoint::from_socket)
        .unwrap_or_default()
}

/// Default port for a URL scheme.
#[inline]
pub fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "https" => Some(443),
        "http" => Some(80),
        _ => None,
    }
}

/// Parse `host[:port]`. Returns `None` for anything that is not a valid
/// authority with a non-empty host and, when present, a numeric port.
pub fn parse_authority(value: &str) -> Option<(String, Option<u16>)> {
    let authority = Authority::from_str(value.trim()).ok()?;
    let raw_host = authority.host();

    let host = raw_host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return None;
    }

    // A port that does not parse as u16 leaves `port_u16()` empty while the
    // authority still carries it after the host.
    let port = match authority.port_u16() {
        Some(port) => Some(port),
        None if authority.as_str().ends_with(raw_host) || authority.as_str().ends_with(':') => {
            None
        }
        None => return None,
    };

    Some((host.to_string(), port))
}
