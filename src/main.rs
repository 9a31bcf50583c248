use std::sync::Arc;

use http::StatusCode;
use opentelemetry::logs::LoggerProvider as _;
use tracing::info;

use tokio_http_otel::config::{Config, RouteResolverConfig};
use tokio_http_otel::core::{HttpError, Request, Response};
use tokio_http_otel::instrumentation::{Instrumentation, TelemetryProviders};
use tokio_http_otel::logging::init_logging;
use tokio_http_otel::middleware::ForwardedMiddleware;
use tokio_http_otel::observability::OtelConfig;
use tokio_http_otel::server::{
    ClosureRequestHandler, DefaultErrorHandler, DefaultHttpDriverFactory, RequestHandler,
    SocketHttpServer,
};
use tokio_http_otel::telemetry::SCOPE_NAME;

/// Request attribute the demo router stores the matched route in.
const ROUTE_ATTRIBUTE: &str = "route";

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut config = Config::from_env()?;
    init_logging(&config.logging)?;

    if config.instrumentation.route_resolvers.is_empty() {
        config
            .instrumentation
            .route_resolvers
            .push(RouteResolverConfig::RequestAttribute {
                attribute: ROUTE_ATTRIBUTE.into(),
            });
    }

    info!(version = tokio_http_otel::PKG_VERSION, "Starting tokio_http_otel demo server");
    config.log_summary();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let otel_config = OtelConfig::from_env()?;

    #[cfg(feature = "otlp")]
    let otel = tokio_http_otel::observability::init_providers(&otel_config)?;

    #[cfg(not(feature = "otlp"))]
    let otel = {
        if otel_config.is_enabled() {
            tracing::warn!("OTEL_ENABLED is set but the otlp feature is off");
        }
        tokio_http_otel::observability::install_propagator();
        tokio_http_otel::observability::OtelProviders::default()
    };

    let mut providers = TelemetryProviders::global();
    if let Some(logger_provider) = &otel.logger_provider {
        providers = providers.with_logger(logger_provider.logger(SCOPE_NAME));
    }

    let instrumentation = Instrumentation::new(
        config.instrumentation.clone(),
        config.http.clone(),
        providers,
    );
    let factory = instrumentation.instrument(Arc::new(DefaultHttpDriverFactory));

    let app: Arc<dyn RequestHandler> = Arc::new(ForwardedMiddleware::new(
        Arc::new(ClosureRequestHandler::new(route)),
        config.server.trusted_proxies.clone(),
    ));

    let running = SocketHttpServer::new(factory)
        .with_drain_timeout(config.server.drain_timeout)
        .start(config.server.listen_addr, app, Arc::new(DefaultErrorHandler))
        .await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    running.stop().await;
    otel.shutdown();

    Ok(())
}

/// Demo routes: `/`, `/users/{id}` and `/fail`.
fn route(request: &mut Request) -> Result<Response, tokio_http_otel::core::HandlerError> {
    let path = request.path().to_string();

    if path == "/" {
        request.set_attribute(ROUTE_ATTRIBUTE, "/");
        return Ok(Response::ok("tokio_http_otel\n"));
    }

    if path == "/fail" {
        request.set_attribute(ROUTE_ATTRIBUTE, "/fail");
        return Err(HttpError::with_reason(StatusCode::SERVICE_UNAVAILABLE, "demo failure").into());
    }

    if let Some(id) = path.strip_prefix("/users/").filter(|id| !id.is_empty()) {
        request.set_attribute(ROUTE_ATTRIBUTE, "/users/{id}");
        return Ok(Response::ok(format!("user {}\n", id)));
    }

    Err(HttpError::new(StatusCode::NOT_FOUND).into())
}
