//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, catch-all route)
//!     → middleware/ (first registered runs outermost)
//!     → proxy.rs (match route, or 404)
//!     → request.rs (rewrite URL, forwarding + trace headers, or 500)
//!     → shared client → backend (or 502)
//!     → response.rs (status, headers, streamed body)
//!     → Send to client
//! ```

pub mod error;
pub mod middleware;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use error::{BuildError, GatewayError, Signal};
pub use proxy::{ClientSettings, OutcomeKind, ProxyHandler, ProxyOutcome};
pub use request::{OutboundRequest, RequestTransformer};
pub use response::ResponseRelay;
pub use server::HttpServer;
