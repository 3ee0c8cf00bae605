//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Log one line per request once the response is known
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Log level comes from config; `RUST_LOG` overrides it when set

use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::http::middleware::{Middleware, Next};
use crate::http::proxy::ProxyOutcome;

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(level: &str) -> String {
    format!("api_gateway={level},tower_http={level}")
}

/// Install the global tracing subscriber.
pub fn init_logging(level: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

/// Logs method, path, status and latency of every request.
#[derive(Debug, Default)]
pub struct RequestLogging;

#[async_trait]
impl Middleware for RequestLogging {
    async fn handle(&self, request: Request<Body>, next: Next<'_>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let response = next.run(request).await;

        let outcome = response.extensions().get::<ProxyOutcome>();
        tracing::info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            route = outcome.and_then(|o| o.prefix.as_deref()),
            outcome = outcome.map(|o| o.kind.as_str()),
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Request completed"
        );
        response
    }

    fn name(&self) -> &'static str {
        "request_logging"
    }
}
