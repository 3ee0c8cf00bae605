//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyHandler (per stage):
//!     → telemetry.rs (Telemetry / Span capability)
//!         → noop.rs (disabled: nothing recorded)
//!         → tracer.rs (spans + logs via tracing)
//!     → propagation.rs (traceparent extract / inject)
//!
//! MiddlewareChain:
//!     → logging.rs (one log line per request)
//!     → metrics.rs (duration histogram, in-flight gauge)
//!
//! Consumers:
//!     → Log output (stdout via tracing-subscriber)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Backends continuing the trace (traceparent header)
//! ```
//!
//! # Design Decisions
//! - Telemetry is injected into the handler, never read from a global
//! - Metrics are cheap (facade calls, no-ops without a recorder)
//! - Telemetry can be switched off entirely with `telemetry.enabled = false`

pub mod logging;
pub mod metrics;
pub mod noop;
pub mod propagation;
pub mod telemetry;
pub mod tracer;

use std::sync::Arc;

use crate::config::TelemetryConfig;

pub use noop::NoopTelemetry;
pub use propagation::TraceContext;
pub use telemetry::{Attribute, RequestEvent, Span, SpanStatus, Telemetry};
pub use tracer::TracingTelemetry;

/// Build the telemetry implementation selected by config.
pub fn from_config(config: &TelemetryConfig) -> Arc<dyn Telemetry> {
    if config.enabled {
        Arc::new(TracingTelemetry::from_config(config))
    } else {
        Arc::new(NoopTelemetry::new(&config.service_name))
    }
}
