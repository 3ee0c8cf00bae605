//! API gateway library: prefix routing in front of HTTP backends.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::GatewayConfig;
pub use http::{HttpServer, ProxyHandler};
pub use lifecycle::Shutdown;
pub use routing::RouteTable;
