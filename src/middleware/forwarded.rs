//! Attaches the forwarded record for requests relayed by trusted proxies.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::core::{Forwarded, HandlerError, Request, Response};
use crate::server::RequestHandler;

/// Parses `Forwarded` / `X-Forwarded-*` into a [`Forwarded`] extension when
/// the peer is a trusted proxy, then delegates.
///
/// Headers from untrusted peers are ignored so clients cannot spoof the
/// addresses reported by the telemetry handlers.
pub struct ForwardedMiddleware {
    inner: Arc<dyn RequestHandler>,
    trusted_proxies: Vec<IpAddr>,
}

impl ForwardedMiddleware {
    pub fn new(inner: Arc<dyn RequestHandler>, trusted_proxies: Vec<IpAddr>) -> Self {
        Self {
            inner,
            trusted_proxies,
        }
    }

    fn is_trusted(&self, request: &Request) -> bool {
        request
            .client()
            .remote_address()
            .and_then(|addr| addr.ip())
            .map(|ip| self.trusted_proxies.contains(&ip))
            .unwrap_or(false)
    }
}

#[async_trait]
impl RequestHandler for ForwardedMiddleware {
    async fn handle_request(&self, request: &mut Request) -> Result<Response, HandlerError> {
        if self.is_trusted(request) {
            if let Some(forwarded) = Forwarded::from_headers(request.headers()) {
                trace!(client = ?forwarded.client(), host = ?forwarded.host(), "forwarded record attached");
                request.extensions_mut().insert(forwarded);
            }
        }
        self.inner.handle_request(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Client, SocketAddress};
    use crate::server::ClosureRequestHandler;
    use bytes::Bytes;
    use http::{HeaderMap, Method};
    use std::net::SocketAddr;

    fn request_from(remote: &str) -> Request {
        let mut headers = HeaderMap::new();
        headers.insert("forwarded", "for=203.0.113.9;host=public.test".parse().unwrap());
        Request::new(Method::GET, "/".parse().unwrap(), headers, Bytes::new()).with_client(
            Client::new(
                SocketAddress::from("10.0.0.1:8080".parse::<SocketAddr>().unwrap()),
                SocketAddress::from(remote.parse::<SocketAddr>().unwrap()),
            ),
        )
    }

    fn echo_host() -> Arc<dyn RequestHandler> {
        Arc::new(ClosureRequestHandler::new(|req: &mut Request| {
            let host = req.forwarded().and_then(|f| f.host()).unwrap_or("-").to_string();
            Ok(Response::ok(host))
        }))
    }

    #[test]
    fn test_trusted_proxy_attaches_record() {
        let middleware = ForwardedMiddleware::new(echo_host(), vec!["10.1.1.1".parse().unwrap()]);
        let mut req = request_from("10.1.1.1:40000");

        tokio_test::block_on(middleware.handle_request(&mut req)).unwrap();
        let forwarded = req.forwarded().unwrap();
        assert_eq!(forwarded.host(), Some("public.test"));
        assert_eq!(forwarded.client().unwrap().ip.to_string(), "203.0.113.9");
    }

    #[test]
    fn test_untrusted_peer_ignored() {
        let middleware = ForwardedMiddleware::new(echo_host(), vec!["10.1.1.1".parse().unwrap()]);
        let mut req = request_from("192.0.2.50:40000");

        tokio_test::block_on(middleware.handle_request(&mut req)).unwrap();
        assert!(req.forwarded().is_none());
    }
}
