//! Socket HTTP server driven by a pluggable [`HttpDriverFactory`].
//!
//! The server accepts TCP connections, creates one driver per connection
//! through the factory and serves HTTP/1.1 and HTTP/2 with automatic
//! protocol detection. Instrumentation hooks in by decorating the factory.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_http_otel::server::{
//!     ClosureRequestHandler, DefaultErrorHandler, DefaultHttpDriverFactory, SocketHttpServer,
//! };
//! use tokio_http_otel::core::Response;
//!
//! let server = SocketHttpServer::new(Arc::new(DefaultHttpDriverFactory));
//! let running = server
//!     .start(
//!         "127.0.0.1:8080".parse()?,
//!         Arc::new(ClosureRequestHandler::new(|_req| Ok(Response::ok("hello")))),
//!         Arc::new(DefaultErrorHandler),
//!     )
//!     .await?;
//!
//! running.stop().await;
//! ```

mod driver;
mod handler;

pub use driver::{DefaultHttpDriver, DefaultHttpDriverFactory, HttpDriver, HttpDriverFactory};
pub use handler::{ClosureRequestHandler, DefaultErrorHandler, ErrorHandler, RequestHandler};

use std::convert::Infallible;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::{Client, SocketAddress};

/// Server errors.
#[derive(Debug)]
pub enum ServerError {
    /// Binding the listen address failed.
    Bind { addr: SocketAddr, source: io::Error },
    /// The bound listener could not report its address.
    LocalAddr(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Bind { addr, source } => {
                write!(f, "failed to bind {}: {}", addr, source)
            }
            ServerError::LocalAddr(e) => write!(f, "failed to read local address: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind { source, .. } => Some(source),
            ServerError::LocalAddr(e) => Some(e),
        }
    }
}

/// TCP HTTP server.
pub struct SocketHttpServer {
    driver_factory: Arc<dyn HttpDriverFactory>,
    drain_timeout: Option<Duration>,
}

impl SocketHttpServer {
    pub fn new(driver_factory: Arc<dyn HttpDriverFactory>) -> Self {
        Self {
            driver_factory,
            drain_timeout: None,
        }
    }

    /// Bound how long [`RunningServer::stop`] waits for open connections.
    /// `None` waits until every connection closed.
    pub fn with_drain_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Bind `addr` and start accepting connections in the background.
    pub async fn start(
        self,
        addr: SocketAddr,
        request_handler: Arc<dyn RequestHandler>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Result<RunningServer, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        info!(
            addr = %local_addr,
            protocols = ?self.driver_factory.application_layer_protocols(),
            "HTTP server listening"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(
            listener,
            self.driver_factory,
            request_handler,
            error_handler,
            shutdown_rx,
            self.drain_timeout,
        ));

        Ok(RunningServer {
            local_addr,
            shutdown_tx,
            task,
        })
    }
}

/// Handle to a started server.
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RunningServer {
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and wait for open connections to drain.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "accept loop panicked");
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    driver_factory: Arc<dyn HttpDriverFactory>,
    request_handler: Arc<dyn RequestHandler>,
    error_handler: Arc<dyn ErrorHandler>,
    mut shutdown_rx: watch::Receiver<bool>,
    drain_timeout: Option<Duration>,
) {
    let builder = auto::Builder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, remote_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(error = %e, "accept error");
                        continue;
                    }
                };
                let _ = stream.set_nodelay(true);

                let local_addr = match stream.local_addr() {
                    Ok(addr) => addr,
                    Err(e) => {
                        debug!(error = %e, "dropping connection without local address");
                        continue;
                    }
                };

                let client = Client::new(
                    SocketAddress::from(local_addr),
                    SocketAddress::from(remote_addr),
                );
                let driver = driver_factory.create_http_driver(
                    Arc::clone(&request_handler),
                    Arc::clone(&error_handler),
                    client,
                );

                let service = service_fn(move |req| {
                    let driver = Arc::clone(&driver);
                    async move { Ok::<_, Infallible>(driver.handle(req).await) }
                });

                let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
                let conn = graceful.watch(conn.into_owned());
                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        debug!(remote = %remote_addr, error = %e, "connection error");
                    }
                });
            }
            _ = shutdown_rx.changed() => {
                debug!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    drop(listener);

    match drain_timeout {
        Some(timeout) => {
            if tokio::time::timeout(timeout, graceful.shutdown()).await.is_err() {
                warn!(timeout = ?timeout, "drain timeout reached with open connections");
            }
        }
        None => graceful.shutdown().await,
    }
    info!("HTTP server stopped");
}
