//! HTTP request abstraction for handlers and telemetry.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, HeaderName};
use http::{Extensions, HeaderMap, Method, Uri};

use super::client::Client;
use super::forwarded::Forwarded;

/// Header name constants for fast lookup.
mod header_names {
    use super::*;

    pub static CONTENT_LENGTH: HeaderName = header::CONTENT_LENGTH;
    pub static HOST: HeaderName = header::HOST;
    pub static USER_AGENT: HeaderName = header::USER_AGENT;
}

type AttributeValue = Arc<dyn fmt::Display + Send + Sync>;

/// HTTP request as seen by request handlers.
///
/// Besides the wire data it carries two stores for passing computed data
/// between pipeline stages:
///
/// - named attributes, rendered as text when read (e.g. a route template
///   set by a router),
/// - typed extensions for per-request internal state.
///
/// Note: Clone is intentionally not derived to prevent expensive copies.
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    version: http::Version,
    client: Client,
    attributes: HashMap<Cow<'static, str>, AttributeValue>,
    extensions: Extensions,
}

impl Request {
    /// Create a new request.
    #[inline]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            version: http::Version::HTTP_11,
            client: Client::default(),
            attributes: HashMap::new(),
            extensions: Extensions::new(),
        }
    }

    /// Attach the connection this request arrived on.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Copy that can outlive a borrow of `self`. Attributes and extensions
    /// are shared values, so the copy costs the header map plus a few
    /// reference counts.
    pub(crate) fn snapshot(&self) -> Self {
        Self {
            method: self.method.clone(),
            uri: self.uri.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            version: self.version,
            client: self.client.clone(),
            attributes: self.attributes.clone(),
            extensions: self.extensions.clone(),
        }
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    #[inline]
    pub fn version(&self) -> http::Version {
        self.version
    }

    #[inline]
    pub fn set_version(&mut self, version: http::Version) {
        self.version = version;
    }

    #[inline]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Protocol version as used by `network.protocol.version`.
    pub fn protocol_version(&self) -> &'static str {
        match self.version {
            http::Version::HTTP_09 => "0.9",
            http::Version::HTTP_10 => "1.0",
            http::Version::HTTP_2 => "2",
            http::Version::HTTP_3 => "3",
            _ => "1.1",
        }
    }

    /// URL scheme: taken from an absolute request URI, otherwise derived
    /// from the transport.
    pub fn scheme(&self) -> &str {
        match self.uri.scheme_str() {
            Some(scheme) => scheme,
            None if self.client.is_encrypted() => "https",
            None => "http",
        }
    }

    /// Get a header value by HeaderName (fast path).
    #[inline]
    fn header_by_name(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a header value by string name (case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values of a header, skipping non-UTF-8 values.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Request target authority (the HTTP/2 `:authority` pseudo-header or an
    /// absolute-form HTTP/1 target).
    #[inline]
    pub fn authority(&self) -> Option<&str> {
        self.uri.authority().map(|a| a.as_str())
    }

    #[inline]
    pub fn host(&self) -> Option<&str> {
        self.header_by_name(&header_names::HOST)
    }

    #[inline]
    pub fn content_length(&self) -> Option<u64> {
        self.header_by_name(&header_names::CONTENT_LENGTH)
            .and_then(|v| v.trim().parse().ok())
    }

    #[inline]
    pub fn user_agent(&self) -> Option<&str> {
        self.header_by_name(&header_names::USER_AGENT)
    }

    // Named attributes

    /// Store a named attribute. Replaces any previous value.
    pub fn set_attribute<V>(&mut self, name: impl Into<Cow<'static, str>>, value: V)
    where
        V: fmt::Display + Send + Sync + 'static,
    {
        self.attributes.insert(name.into(), Arc::new(value));
    }

    /// Get a named attribute.
    pub fn attribute(&self, name: &str) -> Option<&(dyn fmt::Display + Send + Sync)> {
        self.attributes.get(name).map(|v| v.as_ref())
    }

    #[inline]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn remove_attribute(&mut self, name: &str) -> bool {
        self.attributes.remove(name).is_some()
    }

    // Typed extensions

    #[inline]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    #[inline]
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Forwarded record attached by a trusted proxy middleware.
    #[inline]
    pub fn forwarded(&self) -> Option<&Forwarded> {
        self.extensions.get::<Forwarded>()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("client", &self.client)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<B> From<http::Request<B>> for Request
where
    B: Into<Bytes>,
{
    fn from(req: http::Request<B>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: body.into(),
            version: parts.version,
            client: Client::default(),
            attributes: HashMap::new(),
            extensions: parts.extensions,
        }
    }
}
