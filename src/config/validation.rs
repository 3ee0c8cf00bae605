//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, timeouts and backend URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Duplicate prefixes are allowed (last one wins, warned when registered)

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::routing::parse_backend_url;

/// A semantic problem in an otherwise well-formed config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("routes[{index}]: name must not be empty")]
    EmptyRouteName { index: usize },

    #[error("routes[{index}]: prefix must not be empty")]
    EmptyPrefix { index: usize },

    #[error("routes[{index}]: invalid backend URL '{url}': {reason}")]
    InvalidBackendUrl {
        index: usize,
        url: String,
        reason: String,
    },
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(
        "listener.bind_address",
        &config.listener.bind_address,
        &mut errors,
    );
    if config.telemetry.metrics_enabled {
        check_address(
            "telemetry.metrics_address",
            &config.telemetry.metrics_address,
            &mut errors,
        );
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    for (index, route) in config.routes.iter().enumerate() {
        if route.name.trim().is_empty() {
            errors.push(ValidationError::EmptyRouteName { index });
        }
        if route.prefix.is_empty() {
            errors.push(ValidationError::EmptyPrefix { index });
        }
        if let Err(e) = parse_backend_url(&route.backend_url) {
            errors.push(ValidationError::InvalidBackendUrl {
                index,
                url: route.backend_url.clone(),
                reason: e.to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    fn route(name: &str, prefix: &str, backend_url: &str) -> RouteConfig {
        RouteConfig {
            name: name.to_string(),
            prefix: prefix.to_string(),
            backend_url: backend_url.to_string(),
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        config.timeouts.request_secs = 0;
        config.routes = vec![
            route("users", "/users", "http://users:8000"),
            route("", "", "localhost:8000"),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::ZeroRequestTimeout));
        assert!(errors.contains(&ValidationError::EmptyRouteName { index: 1 }));
        assert!(errors.contains(&ValidationError::EmptyPrefix { index: 1 }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidBackendUrl { index: 1, .. })));
    }

    #[test]
    fn metrics_address_ignored_when_metrics_disabled() {
        let mut config = GatewayConfig::default();
        config.telemetry.metrics_address = "nope".to_string();
        assert!(validate_config(&config).is_err());

        config.telemetry.metrics_enabled = false;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn duplicate_prefixes_are_allowed() {
        let mut config = GatewayConfig::default();
        config.routes = vec![
            route("a", "/api", "http://a:1"),
            route("b", "/api", "http://b:2"),
        ];
        assert_eq!(validate_config(&config), Ok(()));
    }
}
