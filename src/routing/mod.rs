//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     RouteConfig[] (validated)
//!     → router.rs (add_route: parse backend URL, store prefix)
//!     → RouteTable moved into the proxy handler, read-only from then on
//!
//! Incoming Request (path):
//!     → router.rs (route lookup)
//!     → matcher.rs (longest literal prefix among all routes)
//!     → Return: matched Route or None
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime (no hot reload)
//! - No regex in hot path (prefix matching only)
//! - Deterministic: longest prefix wins regardless of map iteration order

pub mod matcher;
pub mod router;

pub use router::{parse_backend_url, Route, RouteError, RouteTable};
