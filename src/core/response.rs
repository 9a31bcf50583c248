//! HTTP response abstraction for handlers and telemetry.

use bytes::Bytes;
use http::header::{self, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};

use super::body::{Body, DisposeHooks, ResponseBody};

/// Common header name constants for fast lookup.
mod header_names {
    use super::*;
    pub static CONTENT_LENGTH: HeaderName = header::CONTENT_LENGTH;
    pub static CONTENT_TYPE: HeaderName = header::CONTENT_TYPE;
}

/// Pre-allocated static header values for common content types.
mod content_types {
    use super::*;
    pub static TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
    pub static APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");
}

/// HTTP response.
///
/// Owns a list of dispose hooks which run exactly once, when the body has
/// been fully sent or the response is abandoned.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
    hooks: DisposeHooks,
}

impl Response {
    #[inline]
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    /// Create a 200 OK response with body.
    #[inline]
    pub fn ok(body: impl Into<Body>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    #[inline]
    pub fn new(status: StatusCode, body: impl Into<Body>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            hooks: DisposeHooks::default(),
        }
    }

    /// Create an empty response with given status.
    #[inline]
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, Body::empty())
    }

    /// Plain-text `"{code} {reason}"` error page.
    pub fn error_page(status: StatusCode, reason: Option<&str>) -> Self {
        let reason = reason
            .or_else(|| status.canonical_reason())
            .unwrap_or("Unknown");
        Self::builder()
            .status(status)
            .text()
            .body(format!("{} {}", status.as_u16(), reason))
            .build()
    }

    // Getters

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
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
    pub fn body(&self) -> &Body {
        &self.body
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

    /// Content-Length header value.
    #[inline]
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(&header_names::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(&header_names::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    // Modifiers

    #[inline]
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Set a header by string name and value. Invalid names or values are ignored.
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
    }

    #[inline]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.set_header(name, value);
        self
    }

    #[inline]
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Register a callback to run once the response is disposed.
    #[inline]
    pub fn on_dispose(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.hooks.push(hook);
    }

    /// Number of pending dispose hooks.
    #[inline]
    pub fn pending_dispose_hooks(&self) -> usize {
        self.hooks.len()
    }

    #[inline]
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Convert into a hyper response. Dispose hooks move into the body.
    ///
    /// A `content-length` header is filled in for bodies of known length.
    pub fn into_http(self) -> http::Response<ResponseBody> {
        let Response {
            status,
            mut headers,
            body,
            hooks,
        } = self;

        if !headers.contains_key(&header_names::CONTENT_LENGTH) {
            if let Some(len) = body.exact_len() {
                headers.insert(header_names::CONTENT_LENGTH.clone(), HeaderValue::from(len));
            }
        }

        let mut res = http::Response::new(ResponseBody::new(body, hooks));
        *res.status_mut() = status;
        *res.headers_mut() = headers;
        res
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::empty(StatusCode::OK)
    }
}

/// Builder for creating HTTP responses.
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Option<HeaderMap>, // Lazy allocation
    body: Body,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: None,
            body: Body::empty(),
        }
    }

    #[inline]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add header with typed HeaderName and HeaderValue.
    #[inline]
    pub fn header_value(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers
            .get_or_insert_with(HeaderMap::new)
            .append(name, value);
        self
    }

    /// Add header by strings.
    #[inline]
    pub fn header(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => self.header_value(name, value),
            _ => self,
        }
    }

    #[inline]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Buffered body with a matching `content-length` header.
    pub fn sized_body(self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let len = HeaderValue::from(body.len());
        self.header_value(header_names::CONTENT_LENGTH.clone(), len)
            .body(body)
    }

    #[inline]
    pub fn json(self) -> Self {
        self.header_value(
            header_names::CONTENT_TYPE.clone(),
            content_types::APPLICATION_JSON.clone(),
        )
    }

    #[inline]
    pub fn text(self) -> Self {
        self.header_value(
            header_names::CONTENT_TYPE.clone(),
            content_types::TEXT_PLAIN.clone(),
        )
    }

    #[inline]
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers.unwrap_or_default(),
            body: self.body,
            hooks: DisposeHooks::default(),
        }
    }
}
