//! Context propagation carriers over request and response headers.
//!
//! Inbound extraction goes through any `opentelemetry` [`TextMapPropagator`]
//! via [`HeaderExtractor`]. Outbound injection onto responses goes through
//! the [`OutboundPropagator`] trait, with [`TraceOutboundPropagator`]
//! writing the W3C `traceresponse` header.

use std::collections::HashMap;

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;

/// Header name of the W3C Trace Context response header.
pub const TRACERESPONSE_HEADER: &str = "traceresponse";

/// Read-only carrier over request headers.
///
/// Headers that occur several times are presented as one value joined
/// with `,`.
pub struct HeaderExtractor<'a> {
    headers: &'a HeaderMap,
    joined: HashMap<&'a str, String>,
}

impl<'a> HeaderExtractor<'a> {
    pub fn new(headers: &'a HeaderMap) -> Self {
        let mut joined = HashMap::new();
        for name in headers.keys() {
            let values = headers.get_all(name);
            if values.iter().nth(1).is_some() {
                let all: Vec<&str> = values.iter().filter_map(|v| v.to_str().ok()).collect();
                joined.insert(name.as_str(), all.join(","));
            }
        }
        Self { headers, joined }
    }
}

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        if let Some(value) = self.joined.get(key.as_str()) {
            return Some(value.as_str());
        }
        self.headers.get(key.as_str()).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(|k| k.as_str()).collect()
    }
}

/// Write carrier over response headers. Each `set` replaces the header.
pub struct HeaderInjector<'a>(pub &'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let Ok(name) = HeaderName::from_bytes(key.as_bytes()) {
            if let Ok(val) = HeaderValue::from_str(&value) {
                self.0.insert(name, val);
            }
        }
    }
}

/// Injects outbound correlation headers into a response.
pub trait OutboundPropagator: Send + Sync {
    fn inject(&self, context: &Context, injector: &mut dyn Injector);
}

/// Writes `traceresponse: 00-{trace-id}-{span-id}-{flags}` for the span
/// active in the context.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceOutboundPropagator;

impl TraceOutboundPropagator {
    pub fn new() -> Self {
        Self
    }
}

impl OutboundPropagator for TraceOutboundPropagator {
    fn inject(&self, context: &Context, injector: &mut dyn Injector) {
        let span = context.span();
        let span_context = span.span_context();
        if !span_context.is_valid() {
            return;
        }

        injector.set(
            TRACERESPONSE_HEADER,
            format!(
                "00-{}-{}-{:02x}",
                span_context.trace_id(),
                span_context.span_id(),
                span_context.trace_flags().to_u8()
            ),
        );
    }
}

/// Adapts a regular text-map propagator for response injection.
pub struct TextMapOutboundPropagator<P> {
    inner: P,
}

impl<P: TextMapPropagator> TextMapOutboundPropagator<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

impl<P> OutboundPropagator for TextMapOutboundPropagator<P>
where
    P: TextMapPropagator + Send + Sync,
{
    fn inject(&self, context: &Context, injector: &mut dyn Injector) {
        self.inner.inject_context(context, injector);
    }
}

/// Injects nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopOutboundPropagator;

impl OutboundPropagator for NoopOutboundPropagator {
    fn inject(&self, _context: &Context, _injector: &mut dyn Injector) {}
}
