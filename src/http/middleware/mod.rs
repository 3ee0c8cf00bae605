//! Request middleware.
//!
//! # Data Flow
//! ```text
//! axum entry handler
//!     → chain.rs (outermost middleware first)
//!     → request log → in-flight gauge → duration histogram
//!     → ProxyHandler (terminal handler)
//! ```
//!
//! # Design Decisions
//! - Composition is explicit: the chain is built in code, in order
//! - Telemetry wrappers come from the injected `Telemetry`, so the no-op
//!   implementation yields passthrough steps

pub mod chain;

pub use chain::{telemetry_middlewares, Handler, Middleware, MiddlewareChain, Next};
