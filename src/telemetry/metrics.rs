//! HTTP server metrics: duration, active requests and body sizes.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::metrics::{Histogram, Meter, UpDownCounter};
use opentelemetry::{Context, KeyValue};

use super::semconv::*;
use super::TelemetryHandler;
use crate::address;
use crate::config::HttpConfig;
use crate::core::{HandlerError, Request, Response};
use crate::route::RouteResolver;

/// Bucket boundaries of `http.server.request.duration`, in seconds.
pub const DURATION_BUCKETS: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

struct Instruments {
    duration: Histogram<f64>,
    active_requests: UpDownCounter<i64>,
    request_body_size: Histogram<u64>,
    response_body_size: Histogram<u64>,
}

/// Start of a request as seen by the metrics handler.
///
/// Keeps the attribute set the active-requests counter was incremented
/// with, so the matching decrement hits the same series.
#[derive(Clone)]
struct RequestStart {
    at: Instant,
    active_attributes: Arc<[KeyValue]>,
}

pub struct Metrics {
    instruments: Arc<Instruments>,
    route_resolver: Arc<dyn RouteResolver>,
    config: HttpConfig,
}

impl Metrics {
    pub fn new(meter: &Meter, route_resolver: Arc<dyn RouteResolver>, config: HttpConfig) -> Self {
        let instruments = Instruments {
            duration: meter
                .f64_histogram(HTTP_SERVER_REQUEST_DURATION)
                .with_unit("s")
                .with_description("Duration of HTTP server requests.")
                .with_boundaries(DURATION_BUCKETS.to_vec())
                .build(),
            active_requests: meter
                .i64_up_down_counter(HTTP_SERVER_ACTIVE_REQUESTS)
                .with_unit("{request}")
                .with_description("Number of active HTTP server requests.")
                .build(),
            request_body_size: meter
                .u64_histogram(HTTP_SERVER_REQUEST_BODY_SIZE)
                .with_unit("By")
                .with_description("Size of HTTP server request bodies.")
                .build(),
            response_body_size: meter
                .u64_histogram(HTTP_SERVER_RESPONSE_BODY_SIZE)
                .with_unit("By")
                .with_description("Size of HTTP server response bodies.")
                .build(),
        };

        Self {
            instruments: Arc::new(instruments),
            route_resolver,
            config,
        }
    }

    /// `http.request.method`, `url.scheme`, `server.address`, `server.port`.
    fn basic_attributes(&self, request: &Request) -> Vec<KeyValue> {
        let mut attributes = Vec::with_capacity(8);
        attributes.push(KeyValue::new(
            HTTP_REQUEST_METHOD,
            self.config.method_attribute(request.method()).to_string(),
        ));
        attributes.push(KeyValue::new(URL_SCHEME, request.scheme().to_string()));

        let server = address::server_endpoint(request);
        if let Some(host) = server.address {
            attributes.push(KeyValue::new(SERVER_ADDRESS, host));
        }
        if let Some(port) = server.port {
            attributes.push(KeyValue::new(SERVER_PORT, i64::from(port)));
        }
        attributes
    }

    /// Decrement with the attributes of the matching increment.
    fn active_attributes(&self, request: &Request) -> Arc<[KeyValue]> {
        match request.extensions().get::<RequestStart>() {
            Some(start) => start.active_attributes.clone(),
            None => self.basic_attributes(request).into(),
        }
    }
}

impl TelemetryHandler for Metrics {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn on_request(&self, request: &mut Request, context: Context) -> Context {
        let active_attributes: Arc<[KeyValue]> = self.basic_attributes(request).into();
        self.instruments.active_requests.add(1, &active_attributes);

        request.extensions_mut().insert(RequestStart {
            at: Instant::now(),
            active_attributes,
        });
        context
    }

    fn on_response(&self, response: &mut Response, request: &Request, _context: &Context) {
        let active_attributes = self.active_attributes(request);

        let mut attributes = self.basic_attributes(request);
        if let Some(route) = self.route_resolver.resolve_route(request) {
            attributes.push(KeyValue::new(HTTP_ROUTE, route));
        }
        attributes.push(KeyValue::new(NETWORK_PROTOCOL_VERSION, request.protocol_version()));
        let status = response.status();
        attributes.push(KeyValue::new(
            HTTP_RESPONSE_STATUS_CODE,
            i64::from(status.as_u16()),
        ));
        if status.is_server_error() {
            attributes.push(KeyValue::new(ERROR_TYPE, status.as_str().to_string()));
        }

        let start = request.extensions().get::<RequestStart>().map(|s| s.at);
        let request_size = request.content_length();
        let response_size = response.content_length();
        let instruments = self.instruments.clone();

        response.on_dispose(move || {
            instruments.active_requests.add(-1, &active_attributes);
            if let Some(start) = start {
                instruments
                    .duration
                    .record(start.elapsed().as_secs_f64(), &attributes);
            }
            if let Some(size) = request_size {
                instruments.request_body_size.record(size, &attributes);
            }
            if let Some(size) = response_size {
                instruments.response_body_size.record(size, &attributes);
            }
        });
    }

    fn on_error(&self, error: &HandlerError, request: &Request, _context: &Context) {
        self.instruments
            .active_requests
            .add(-1, &self.active_attributes(request));

        let mut attributes = self.basic_attributes(request);
        attributes.push(KeyValue::new(NETWORK_PROTOCOL_VERSION, request.protocol_version()));
        attributes.push(KeyValue::new(ERROR_TYPE, error.type_name()));

        if let Some(start) = request.extensions().get::<RequestStart>() {
            self.instruments
                .duration
                .record(start.at.elapsed().as_secs_f64(), &attributes);
        }
        if let Some(size) = request.content_length() {
            self.instruments.request_body_size.record(size, &attributes);
        }
    }
}
