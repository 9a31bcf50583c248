//! Test helpers: in-process server and in-memory telemetry backends

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use opentelemetry::logs::LoggerProvider as _;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::logs::LoggerProvider;
use opentelemetry_sdk::metrics::data::ResourceMetrics;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::runtime;
use opentelemetry_sdk::testing::logs::InMemoryLogExporter;
use opentelemetry_sdk::testing::metrics::InMemoryMetricExporter;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;
use reqwest::{Client, Response};
use tokio::sync::Notify;

use async_trait::async_trait;
use tokio_http_otel::config::{HttpConfig, InstrumentationConfig, RouteResolverConfig};
use tokio_http_otel::core::{Body, HandlerError, HttpError, Request};
use tokio_http_otel::instrumentation::{Instrumentation, TelemetryProviders};
use tokio_http_otel::server::{
    ClosureRequestHandler, DefaultErrorHandler, DefaultHttpDriverFactory, ErrorHandler,
    RequestHandler, RunningServer, SocketHttpServer,
};

/// Request attribute the test router stores the matched route in.
pub const ROUTE_ATTRIBUTE: &str = "route";

/// SDK providers backed by in-memory exporters.
pub struct TestTelemetry {
    pub spans: InMemorySpanExporter,
    pub metrics: InMemoryMetricExporter,
    pub logs: InMemoryLogExporter,
    tracer_provider: TracerProvider,
    meter_provider: SdkMeterProvider,
    logger_provider: LoggerProvider,
}

#[allow(dead_code)]
impl TestTelemetry {
    pub fn new() -> Self {
        let spans = InMemorySpanExporter::default();
        let tracer_provider = TracerProvider::builder()
            .with_simple_exporter(spans.clone())
            .build();

        let metrics = InMemoryMetricExporter::default();
        let reader = PeriodicReader::builder(metrics.clone(), runtime::Tokio).build();
        let meter_provider = SdkMeterProvider::builder().with_reader(reader).build();

        let logs = InMemoryLogExporter::default();
        let logger_provider = LoggerProvider::builder()
            .with_simple_exporter(logs.clone())
            .build();

        Self {
            spans,
            metrics,
            logs,
            tracer_provider,
            meter_provider,
            logger_provider,
        }
    }

    pub fn providers(&self) -> TelemetryProviders {
        TelemetryProviders::global()
            .with_tracer(self.tracer_provider.tracer("integration"))
            .with_meter(self.meter_provider.meter("integration"))
            .with_logger(self.logger_provider.logger("integration"))
    }

    /// Instrumentation with one `route` attribute resolver.
    pub fn instrumentation(&self) -> Instrumentation {
        let config = InstrumentationConfig {
            enabled: true,
            route_resolvers: vec![RouteResolverConfig::RequestAttribute {
                attribute: ROUTE_ATTRIBUTE.into(),
            }],
        };
        Instrumentation::new(config, HttpConfig::default(), self.providers())
    }

    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.spans.get_finished_spans().expect("span exporter")
    }

    /// Poll until `count` spans finished.
    pub async fn wait_for_spans(&self, count: usize) -> Vec<SpanData> {
        for _ in 0..100 {
            let spans = self.finished_spans();
            if spans.len() >= count {
                return spans;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} finished spans, got {}",
            count,
            self.finished_spans().len()
        );
    }

    pub fn collect_metrics(&self) -> Vec<ResourceMetrics> {
        self.meter_provider.force_flush().expect("metrics flush");
        self.metrics.get_finished_metrics().expect("metrics exporter")
    }

    pub fn emitted_logs(&self) -> usize {
        self.logs.get_emitted_logs().expect("logs exporter").len()
    }
}

/// In-process server on an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    running: RunningServer,
}

#[allow(dead_code)]
impl TestServer {
    /// Serve `app` through the default driver factory, instrumented.
    pub async fn start(
        instrumentation: &Instrumentation,
        app: Arc<dyn RequestHandler>,
        errors: Arc<dyn ErrorHandler>,
    ) -> Self {
        let factory = instrumentation.instrument(Arc::new(DefaultHttpDriverFactory));
        let running = SocketHttpServer::new(factory)
            .with_drain_timeout(Some(Duration::from_secs(2)))
            .start("127.0.0.1:0".parse().unwrap(), app, errors)
            .await
            .expect("server start");

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{}", running.local_addr()),
            client,
            running,
        }
    }

    /// [`TestServer::start`] with the test router and default error pages.
    pub async fn with_router(instrumentation: &Instrumentation, gate: Arc<Notify>) -> Self {
        Self::start(instrumentation, router(gate), Arc::new(DefaultErrorHandler)).await
    }

    pub fn port(&self) -> u16 {
        self.running.local_addr().port()
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut req = self.client.get(format!("{}{}", self.base_url, path));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        req.send().await.expect("GET request failed")
    }

    pub async fn stop(self) {
        self.running.stop().await;
    }
}

/// Test routes:
/// - `/users/{id}`: 200
/// - `/fail`: `HttpError` 503
/// - `/boom`: plain error, 500
/// - `/stream`: chunked body, second chunk sent once `gate` is notified
/// - anything else: 404
pub fn router(gate: Arc<Notify>) -> Arc<dyn RequestHandler> {
    Arc::new(ClosureRequestHandler::new(move |req: &mut Request| {
        let path = req.path().to_string();

        if let Some(id) = path.strip_prefix("/users/") {
            req.set_attribute(ROUTE_ATTRIBUTE, "/users/{id}");
            return Ok(tokio_http_otel::core::Response::ok(format!("user {}", id)));
        }

        match path.as_str() {
            "/fail" => {
                req.set_attribute(ROUTE_ATTRIBUTE, "/fail");
                Err(HttpError::with_reason(StatusCode::SERVICE_UNAVAILABLE, "backend down").into())
            }
            "/boom" => {
                req.set_attribute(ROUTE_ATTRIBUTE, "/boom");
                Err(HandlerError::msg("boom"))
            }
            "/stream" => {
                req.set_attribute(ROUTE_ATTRIBUTE, "/stream");
                let (tx, body) = Body::channel(4);
                let gate = Arc::clone(&gate);
                tokio::spawn(async move {
                    let _ = tx.send(Bytes::from_static(b"first;")).await;
                    gate.notified().await;
                    let _ = tx.send(Bytes::from_static(b"second")).await;
                });
                Ok(tokio_http_otel::core::Response::new(StatusCode::OK, body))
            }
            _ => Err(HttpError::new(StatusCode::NOT_FOUND).into()),
        }
    }))
}

/// Handler that records its route and never returns.
pub struct StalledHandler;

#[async_trait]
impl RequestHandler for StalledHandler {
    async fn handle_request(
        &self,
        request: &mut Request,
    ) -> Result<tokio_http_otel::core::Response, HandlerError> {
        request.set_attribute(ROUTE_ATTRIBUTE, "/stall");
        std::future::pending().await
    }
}

/// Error renderer that always fails.
pub struct FailingErrorHandler;

#[async_trait]
impl ErrorHandler for FailingErrorHandler {
    async fn handle_error(
        &self,
        _status: StatusCode,
        _reason: Option<&str>,
        _request: Option<&Request>,
    ) -> Result<tokio_http_otel::core::Response, HandlerError> {
        Err(HandlerError::msg("renderer failed"))
    }
}

/// Attribute value on a finished span.
#[allow(dead_code)]
pub fn span_attr<'a>(span: &'a SpanData, key: &str) -> Option<&'a Value> {
    attr(&span.attributes, key)
}

pub fn attr<'a>(attributes: &'a [KeyValue], key: &str) -> Option<&'a Value> {
    attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

/// Assert that response has expected status
#[allow(dead_code)]
pub fn assert_status(response: &Response, expected: reqwest::StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}
