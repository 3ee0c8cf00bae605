//! Route table: registered path prefixes and their backends.
//!
//! # Responsibilities
//! - Validate and store `prefix -> backend` associations
//! - Look up the route for a request path (longest prefix wins)
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Registration happens at startup only; the table is then moved into the
//!   proxy handler and shared read-only (no locks on the hot path)
//! - Registering an existing prefix overwrites it: last registration wins,
//!   so repeating `add_route` with a different backend is not a no-op
//! - O(n) prefix scan per request (acceptable for tens of routes)

use std::collections::HashMap;

use thiserror::Error;
use url::Url;

use super::matcher::{longest_match, PathPrefixMatcher};

/// Error returned when a route cannot be registered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// The prefix was empty.
    #[error("route prefix must not be empty")]
    EmptyPrefix,
    /// The backend URL is not an absolute URL with scheme and host.
    #[error("invalid backend URL {url:?}: {reason}")]
    InvalidBackendUrl { url: String, reason: String },
}

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route {
    matcher: PathPrefixMatcher,
    backend: Url,
}

impl Route {
    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    /// Base URL requests are forwarded to.
    pub fn backend(&self) -> &Url {
        &self.backend
    }

    /// Path left after removing this route's prefix once.
    pub fn strip_prefix<'p>(&self, path: &'p str) -> Option<&'p str> {
        self.matcher.strip(path)
    }
}

/// Parse a backend URL, requiring an absolute URL with scheme and host.
pub fn parse_backend_url(raw: &str) -> Result<Url, RouteError> {
    let invalid = |reason: String| RouteError::InvalidBackendUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() || !url.has_host() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Mapping of path prefixes to backend base URLs.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl RouteTable {
    /// Create an empty route table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `prefix` to forward to `backend_url`.
    ///
    /// A prefix that is already registered is overwritten.
    pub fn add_route(&mut self, prefix: &str, backend_url: &str) -> Result<(), RouteError> {
        if prefix.is_empty() {
            return Err(RouteError::EmptyPrefix);
        }
        let backend = parse_backend_url(backend_url)?;

        let route = Route {
            matcher: PathPrefixMatcher::new(prefix),
            backend,
        };
        if let Some(previous) = self.routes.insert(prefix.to_string(), route) {
            tracing::warn!(
                prefix = %prefix,
                previous_backend = %previous.backend,
                backend = %backend_url,
                "Route prefix registered twice, replacing previous backend"
            );
        }
        Ok(())
    }

    /// Find the route with the longest prefix that `path` starts with.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        longest_match(
            path,
            self.routes.iter().map(|(prefix, route)| (prefix.as_str(), route)),
        )
        .map(|(_, route)| route)
    }

    /// Look up a route by its exact prefix.
    pub fn get(&self, prefix: &str) -> Option<&Route> {
        self.routes.get(prefix)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterate over registered routes in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_route_validates_backend() {
        let cases = [
            ("valid route with scheme", "/user", "http://localhost:8000", true),
            ("scheme-less host:port", "/order", "localhost:8000", false),
            ("empty url", "/product", "", false),
            ("bare host", "/product", "localhost", false),
            ("valid https route", "/secure", "https://example.com", true),
        ];

        for (name, prefix, url, ok) in cases {
            let mut table = RouteTable::new();
            let result = table.add_route(prefix, url);
            assert_eq!(result.is_ok(), ok, "{name}: {result:?}");
            assert_eq!(table.get(prefix).is_some(), ok, "{name}");
        }
    }

    #[test]
    fn add_route_rejects_empty_prefix() {
        let mut table = RouteTable::new();
        assert_eq!(
            table.add_route("", "http://localhost:8000"),
            Err(RouteError::EmptyPrefix)
        );
        assert!(table.is_empty());
    }

    #[test]
    fn duplicate_prefix_last_wins() {
        let mut table = RouteTable::new();
        table.add_route("/api", "http://first:1000").unwrap();
        table.add_route("/api", "http://second:2000").unwrap();

        assert_eq!(table.len(), 1);
        let route = table.match_path("/api/x").unwrap();
        assert_eq!(route.backend().host_str(), Some("second"));
    }

    #[test]
    fn longest_prefix_wins() {
        let mut table = RouteTable::new();
        table.add_route("/api", "http://api:1000").unwrap();
        table.add_route("/api/v1", "http://v1:2000").unwrap();
        table.add_route("/", "http://root:3000").unwrap();

        assert_eq!(table.match_path("/api/v1/x").unwrap().prefix(), "/api/v1");
        assert_eq!(table.match_path("/api/v2").unwrap().prefix(), "/api");
        assert_eq!(table.match_path("/other").unwrap().prefix(), "/");
    }

    #[test]
    fn longest_prefix_is_exhaustive() {
        // Many overlapping prefixes so that any HashMap order is exercised.
        let mut table = RouteTable::new();
        let mut prefix = String::new();
        for i in 0..16 {
            prefix.push_str(&format!("/s{i}"));
            table
                .add_route(&prefix, &format!("http://backend-{i}:80"))
                .unwrap();
        }
        let deepest = prefix.clone();
        let path = format!("{deepest}/leaf");

        let route = table.match_path(&path).unwrap();
        assert_eq!(route.prefix(), deepest);
        assert_eq!(route.backend().host_str(), Some("backend-15"));
    }

    #[test]
    fn unmatched_path_returns_none() {
        let mut table = RouteTable::new();
        table.add_route("/api", "http://api:1000").unwrap();
        assert!(table.match_path("/orders").is_none());
        assert!(table.match_path("").is_none());
    }

    #[test]
    fn empty_table_never_matches() {
        let table = RouteTable::new();
        for path in ["/", "", "/api", "/a/b/c?x=1"] {
            assert!(table.match_path(path).is_none(), "{path}");
        }
    }
}
