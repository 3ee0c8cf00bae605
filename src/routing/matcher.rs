//! Path prefix matching.
//!
//! # Responsibilities
//! - Test a request path against a literal prefix (case-sensitive)
//! - Pick the longest matching prefix out of an unordered candidate set
//!
//! # Design Decisions
//! - Literal `starts_with`, no regex, no segment awareness (`/api` matches `/apiv2`)
//! - Selection scans every candidate; the result never depends on iteration order

/// Matches the request path against a literal prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if `path` starts with this prefix.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    /// Remove the prefix from the start of `path`, exactly once.
    ///
    /// Returns `None` when the path does not start with the prefix.
    pub fn strip<'p>(&self, path: &'p str) -> Option<&'p str> {
        path.strip_prefix(self.prefix.as_str())
    }
}

/// Pick the longest prefix in `candidates` that matches `path`.
///
/// Every candidate is visited; a later candidate only replaces the current
/// best when it is strictly longer, so equal-length prefixes (which can only
/// be identical strings) never flip the result.
pub fn longest_match<'a, T, I>(path: &str, candidates: I) -> Option<(&'a str, T)>
where
    I: IntoIterator<Item = (&'a str, T)>,
{
    candidates
        .into_iter()
        .filter(|(prefix, _)| path.starts_with(prefix))
        .fold(None, |best: Option<(&'a str, T)>, (prefix, value)| match best {
            Some((best_prefix, _)) if best_prefix.len() >= prefix.len() => best,
            _ => Some((prefix, value)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api");

        assert!(matcher.matches("/api/v1"));
        assert!(matcher.matches("/api"));
        assert!(matcher.matches("/apiv2"));
        assert!(!matcher.matches("/images"));
        assert!(!matcher.matches("/API/v1")); // Case sensitive
    }

    #[test]
    fn strip_removes_prefix_once() {
        let matcher = PathPrefixMatcher::new("/api");
        assert_eq!(matcher.strip("/api/api/x"), Some("/api/x"));
        assert_eq!(matcher.strip("/api"), Some(""));
        assert_eq!(matcher.strip("/other"), None);
    }

    #[test]
    fn longest_match_ignores_candidate_order() {
        let forward = vec![("/", 1), ("/api", 2), ("/api/v1", 3)];
        let mut reverse = forward.clone();
        reverse.reverse();

        assert_eq!(longest_match("/api/v1/x", forward), Some(("/api/v1", 3)));
        assert_eq!(longest_match("/api/v1/x", reverse), Some(("/api/v1", 3)));
    }

    #[test]
    fn longest_match_none_when_nothing_matches() {
        let candidates = vec![("/api", ()), ("/users", ())];
        assert_eq!(longest_match("/orders", candidates), None);
        assert_eq!(longest_match::<(), _>("/orders", Vec::new()), None);
    }
}
