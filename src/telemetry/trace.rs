//! Server spans.

use std::borrow::Cow;
use std::sync::Arc;

use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Array, Context, KeyValue, StringValue, Value};

use super::sanitizer::{DefaultSanitizer, UriSanitizer};
use super::semconv::*;
use super::TelemetryHandler;
use crate::address;
use crate::config::HttpConfig;
use crate::core::{HandlerError, Request, Response, SocketAddress};
use crate::route::RouteResolver;

/// Starts one server span per request and ends it once the response body
/// is done or the request failed.
pub struct Tracing<T> {
    tracer: T,
    route_resolver: Arc<dyn RouteResolver>,
    config: HttpConfig,
    sanitizer: Arc<dyn UriSanitizer>,
    request_headers: Vec<(String, String)>,
    response_headers: Vec<(String, String)>,
}

impl<T> Tracing<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    pub fn new(tracer: T, route_resolver: Arc<dyn RouteResolver>, config: HttpConfig) -> Self {
        Self {
            tracer,
            route_resolver,
            request_headers: header_attributes(&config.request_captured_headers, "request"),
            response_headers: header_attributes(&config.response_captured_headers, "response"),
            config,
            sanitizer: Arc::new(DefaultSanitizer::new()),
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: impl UriSanitizer + 'static) -> Self {
        self.sanitizer = Arc::new(sanitizer);
        self
    }

    fn span_method<'a>(&self, request: &'a Request) -> &'a str {
        self.config.known_method(request.method()).unwrap_or("HTTP")
    }

    fn apply_route(&self, request: &Request, context: &Context) {
        if let Some(route) = self.route_resolver.resolve_route(request) {
            let span = context.span();
            span.update_name(format!("{} {}", self.span_method(request), route));
            span.set_attribute(KeyValue::new(HTTP_ROUTE, route));
        }
    }

    fn network_attributes(&self, request: &Request, attributes: &mut Vec<KeyValue>) {
        let server = &self.config.server;
        let client = request.client();

        if let Some(local) = client.local_address() {
            if server.capture_network_local_address {
                attributes.push(KeyValue::new(NETWORK_LOCAL_ADDRESS, local.address()));
            }
            if let (true, Some(port)) = (server.capture_network_local_port, local.port()) {
                attributes.push(KeyValue::new(NETWORK_LOCAL_PORT, i64::from(port)));
            }
            if server.capture_network_transport {
                attributes.push(KeyValue::new(NETWORK_TRANSPORT, local.transport()));
            }
        }

        if let Some(remote) = client.remote_address() {
            attributes.push(KeyValue::new(NETWORK_PEER_ADDRESS, remote.address()));
            if let SocketAddress::Internet(addr) = remote {
                attributes.push(KeyValue::new(NETWORK_PEER_PORT, i64::from(addr.port())));
            }
        }

        let resolved = address::resolve(request);
        if let Some(host) = resolved.server.address {
            attributes.push(KeyValue::new(SERVER_ADDRESS, host));
        }
        if let Some(port) = resolved.server.port {
            attributes.push(KeyValue::new(SERVER_PORT, i64::from(port)));
        }
        if let Some(addr) = resolved.client.address {
            attributes.push(KeyValue::new(CLIENT_ADDRESS, addr));
        }
        if let (true, Some(port)) = (server.capture_client_port, resolved.client.port) {
            attributes.push(KeyValue::new(CLIENT_PORT, i64::from(port)));
        }
    }
}

impl<T> TelemetryHandler for Tracing<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn on_request(&self, request: &mut Request, context: Context) -> Context {
        let known = self.config.known_method(request.method());
        let mut attributes = Vec::with_capacity(16);

        match known {
            Some(method) => {
                attributes.push(KeyValue::new(HTTP_REQUEST_METHOD, method.to_string()));
            }
            None => {
                attributes.push(KeyValue::new(HTTP_REQUEST_METHOD, "_OTHER"));
                attributes.push(KeyValue::new(
                    HTTP_REQUEST_METHOD_ORIGINAL,
                    request.method().as_str().to_string(),
                ));
            }
        }

        attributes.push(KeyValue::new(URL_PATH, request.path().to_string()));
        attributes.push(KeyValue::new(URL_SCHEME, request.scheme().to_string()));
        if let Some(query) = request.query().filter(|q| !q.is_empty()) {
            attributes.push(KeyValue::new(
                URL_QUERY,
                self.sanitizer.sanitize_query(query).into_owned(),
            ));
        }
        attributes.push(KeyValue::new(NETWORK_PROTOCOL_VERSION, request.protocol_version()));
        if let Some(agent) = request.user_agent() {
            attributes.push(KeyValue::new(USER_AGENT_ORIGINAL, agent.to_string()));
        }

        self.network_attributes(request, &mut attributes);
        push_headers(&self.request_headers, |name| request.header_values(name), &mut attributes);

        if self.config.server.capture_request_body_size {
            if let Some(size) = request.content_length() {
                attributes.push(KeyValue::new(HTTP_REQUEST_BODY_SIZE, size as i64));
            }
        }

        let name: Cow<'static, str> = match known {
            Some(method) => method.to_string().into(),
            None => "HTTP".into(),
        };
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Server)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, &context);

        context.with_span(span)
    }

    fn on_response(&self, response: &mut Response, request: &Request, context: &Context) {
        self.apply_route(request, context);

        let span = context.span();
        let mut attributes = Vec::new();
        push_headers(&self.response_headers, |name| response.header_values(name), &mut attributes);
        for attribute in attributes {
            span.set_attribute(attribute);
        }

        let status = response.status();
        span.set_attribute(KeyValue::new(
            HTTP_RESPONSE_STATUS_CODE,
            i64::from(status.as_u16()),
        ));
        if status.is_server_error() {
            span.set_status(Status::error(""));
            span.set_attribute(KeyValue::new(ERROR_TYPE, status.as_str().to_string()));
        }

        if self.config.server.capture_response_body_size {
            if let Some(size) = response.content_length() {
                span.set_attribute(KeyValue::new(HTTP_RESPONSE_BODY_SIZE, size as i64));
            }
        }

        let context = context.clone();
        response.on_dispose(move || context.span().end());
    }

    fn on_error(&self, error: &HandlerError, request: &Request, context: &Context) {
        self.apply_route(request, context);

        let span = context.span();
        span.add_event(
            "exception",
            vec![
                KeyValue::new(EXCEPTION_TYPE, error.type_name()),
                KeyValue::new(EXCEPTION_MESSAGE, error.to_string()),
                KeyValue::new(EXCEPTION_ESCAPED, true),
            ],
        );
        span.set_status(Status::error(error.to_string()));
        span.set_attribute(KeyValue::new(ERROR_TYPE, error.type_name()));
        span.end();
    }
}

/// `(lowercased header, attribute key)` pairs.
fn header_attributes(headers: &[String], kind: &str) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|header| {
            let header = header.to_ascii_lowercase();
            let key = format!("http.{}.header.{}", kind, header);
            (header, key)
        })
        .collect()
}

fn push_headers<'a, F>(headers: &[(String, String)], values: F, attributes: &mut Vec<KeyValue>)
where
    F: Fn(&str) -> Vec<&'a str>,
{
    for (header, key) in headers {
        let values = values(header);
        if values.is_empty() {
            continue;
        }
        let values: Vec<StringValue> = values
            .into_iter()
            .map(|v| StringValue::from(v.to_string()))
            .collect();
        attributes.push(KeyValue::new(key.clone(), Value::Array(Array::String(values))));
    }
}
