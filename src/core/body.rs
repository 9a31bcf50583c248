//! Response bodies and completion tracking.
//!
//! A [`Body`] is either a buffered payload or a stream of chunks. When a
//! response is handed to the server it becomes a [`ResponseBody`] that owns
//! the response's dispose hooks and runs them once the body is finished or
//! dropped (connection aborted, response discarded).

use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Boxed error type for body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body.
pub struct Body {
    inner: UnsyncBoxBody<Bytes, BoxError>,
}

impl Body {
    /// Wrap any `http_body::Body` producing `Bytes`.
    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self {
            inner: body.map_err(Into::into).boxed_unsync(),
        }
    }

    #[inline]
    pub fn empty() -> Self {
        Self::new(Empty::<Bytes>::new())
    }

    /// Buffered body.
    #[inline]
    pub fn full(data: impl Into<Bytes>) -> Self {
        Self::new(Full::new(data.into()))
    }

    /// Body produced from a stream of chunks.
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let frames = stream.map(|chunk| chunk.map(Frame::data).map_err(Into::<BoxError>::into));
        Self::new(StreamBody::new(frames))
    }

    /// Streaming body fed through a channel.
    ///
    /// The body ends when every sender is dropped.
    pub fn channel(buffer: usize) -> (mpsc::Sender<Bytes>, Self) {
        let (tx, rx) = mpsc::channel::<Bytes>(buffer);
        let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
        (tx, Self::from_stream(stream))
    }

    /// Exact length when known up front.
    #[inline]
    pub fn exact_len(&self) -> Option<u64> {
        self.inner.size_hint().exact()
    }

    /// Collect the whole body (test and small-payload helper).
    pub async fn collect_bytes(self) -> Result<Bytes, BoxError> {
        Ok(self.inner.collect().await?.to_bytes())
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("exact_len", &self.exact_len())
            .finish()
    }
}

impl From<Bytes> for Body {
    fn from(data: Bytes) -> Self {
        Self::full(data)
    }
}

impl From<String> for Body {
    fn from(data: String) -> Self {
        Self::full(data)
    }
}

impl From<&'static str> for Body {
    fn from(data: &'static str) -> Self {
        Self::full(Bytes::from_static(data.as_bytes()))
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Self::full(data)
    }
}

/// One-shot callbacks run when a response is disposed.
///
/// Hooks run in registration order, at most once: either explicitly via
/// [`DisposeHooks::run`] or when the value is dropped.
#[derive(Default)]
pub struct DisposeHooks {
    hooks: Vec<Box<dyn FnOnce() + Send>>,
}

impl DisposeHooks {
    #[inline]
    pub fn push(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.hooks.push(Box::new(hook));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run and clear all registered hooks.
    pub fn run(&mut self) {
        for hook in self.hooks.drain(..) {
            hook();
        }
    }
}

impl Drop for DisposeHooks {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for DisposeHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposeHooks")
            .field("pending", &self.hooks.len())
            .finish()
    }
}

/// Body handed to hyper: delegates frames and fires the dispose hooks when
/// the last frame was produced, or on drop if it never was.
pub struct ResponseBody {
    inner: UnsyncBoxBody<Bytes, BoxError>,
    hooks: DisposeHooks,
}

impl ResponseBody {
    pub(crate) fn new(body: Body, hooks: DisposeHooks) -> Self {
        Self {
            inner: body.inner,
            hooks,
        }
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => this.hooks.run(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.hooks.run(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("hooks", &self.hooks)
            .finish()
    }
}
