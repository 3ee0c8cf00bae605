//! Startup orchestration.
//!
//! # Responsibilities
//! - Register configured routes in order
//! - Report each registered route
//!
//! # Design Decisions
//! - Fail fast: the first invalid route aborts startup
//! - The route table is complete before the server accepts traffic

use thiserror::Error;

use crate::config::RouteConfig;
use crate::routing::{RouteError, RouteTable};

/// Error raised while preparing the gateway.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("route '{name}' ({prefix}): {source}")]
    InvalidRoute {
        name: String,
        prefix: String,
        #[source]
        source: RouteError,
    },
}

/// Build the route table from config, in declaration order.
pub fn build_route_table(routes: &[RouteConfig]) -> Result<RouteTable, StartupError> {
    let mut table = RouteTable::new();

    for route in routes {
        table
            .add_route(&route.prefix, &route.backend_url)
            .map_err(|source| StartupError::InvalidRoute {
                name: route.name.clone(),
                prefix: route.prefix.clone(),
                source,
            })?;

        tracing::info!(
            name = %route.name,
            prefix = %route.prefix,
            backend = %route.backend_url,
            "Route added"
        );
    }

    Ok(table)
}
