//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a single catch-all entry point
//! - Wire up the middleware chain around the proxy handler
//! - Bind server to listener, exposing the peer address to handlers
//! - Drain in-flight requests on shutdown, bounded by the grace period

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::http::middleware::{telemetry_middlewares, MiddlewareChain};
use crate::http::proxy::{ClientSettings, ProxyHandler};
use crate::observability::Telemetry;
use crate::routing::RouteTable;

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    grace_period: Duration,
}

impl HttpServer {
    /// Create a server dispatching every request to `chain`.
    pub fn new(chain: MiddlewareChain, grace_period: Duration) -> Self {
        let router = Self::build_router(Arc::new(chain));
        Self {
            router,
            grace_period,
        }
    }

    /// Create a server with the standard telemetry middleware around a proxy
    /// handler for `routes`.
    pub fn from_config(
        config: &GatewayConfig,
        routes: RouteTable,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self, rustls::Error> {
        let middlewares = telemetry_middlewares(telemetry.as_ref());
        let handler = ProxyHandler::new(
            routes,
            telemetry,
            ClientSettings::from(&config.timeouts),
        )?;

        let chain = MiddlewareChain::new(Arc::new(handler)).with_all(middlewares);
        tracing::debug!(middlewares = ?chain.names(), "Middleware chain built");

        Ok(Self::new(
            chain,
            Duration::from_secs(config.shutdown.grace_period_secs),
        ))
    }

    /// Build the Axum router: every method and path goes to the chain.
    fn build_router(chain: Arc<MiddlewareChain>) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_entry))
            .route("/", any(gateway_entry))
            .with_state(chain)
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires and in-flight requests drain.
    ///
    /// Requests still running when the grace period ends are abandoned.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut drain_signal = shutdown.resubscribe();
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining in-flight requests");
            })
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                result?;
                tracing::info!("HTTP server stopped");
                return Ok(());
            }
            _ = drain_signal.recv() => {}
        }

        match tokio::time::timeout(self.grace_period, &mut server).await {
            Ok(result) => {
                result?;
                tracing::info!("HTTP server stopped");
            }
            Err(_) => {
                tracing::warn!(
                    grace_period_secs = self.grace_period.as_secs(),
                    "Grace period elapsed, abandoning remaining requests"
                );
            }
        }
        Ok(())
    }
}

/// Single entry point: hand the request to the middleware chain.
async fn gateway_entry(
    State(chain): State<Arc<MiddlewareChain>>,
    request: Request<Body>,
) -> Response {
    chain.call(request).await
}
