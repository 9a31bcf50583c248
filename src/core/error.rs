//! Error types carried through request handling.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;

/// Error raised with an explicit HTTP status for the error renderer.
#[derive(Debug, Clone)]
pub struct HttpError {
    status: StatusCode,
    reason: Option<String>,
}

impl HttpError {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
        }
    }

    pub fn with_reason(status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: Some(reason.into()),
        }
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "HTTP {}: {}", self.status.as_u16(), reason),
            None => write!(f, "HTTP {}", self.status),
        }
    }
}

impl std::error::Error for HttpError {}

struct Inner {
    type_name: &'static str,
    status: StatusCode,
    reason: Option<String>,
    source: Box<dyn std::error::Error + Send + Sync>,
}

/// Failure of a request handler or error renderer.
///
/// Keeps the originating error's type name (reported as `error.type` and
/// `exception.type`) and the status the error renderer should produce.
/// Cloning is cheap; the pipeline keeps a copy on the request while the
/// original propagates to the driver.
///
/// Any `std::error::Error` converts with `?`.
#[derive(Clone)]
pub struct HandlerError {
    inner: Arc<Inner>,
}

impl HandlerError {
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let http = (&error as &dyn Any).downcast_ref::<HttpError>();
        let status = http
            .map(HttpError::status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let reason = http.and_then(|e| e.reason().map(str::to_string));

        Self {
            inner: Arc::new(Inner {
                type_name: std::any::type_name::<E>(),
                status,
                reason,
                source: Box::new(error),
            }),
        }
    }

    /// Error with a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// Fully qualified type name of the originating error.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.inner.type_name
    }

    /// Status the error response should carry.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.inner.status
    }

    /// Reason phrase override for the error response.
    #[inline]
    pub fn reason(&self) -> Option<&str> {
        self.inner.reason.as_deref()
    }

    /// The originating error.
    #[inline]
    pub fn source(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.inner.source.as_ref()
    }

    /// Downcast the originating error.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.inner.source.downcast_ref::<E>()
    }

    /// Whether both values share the same originating error.
    #[inline]
    pub fn same_as(&self, other: &HandlerError) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.source, f)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("type", &self.inner.type_name)
            .field("status", &self.inner.status)
            .field("source", &self.inner.source)
            .finish()
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}

/// Result type alias for request handling.
pub type Result<T> = std::result::Result<T, HandlerError>;
