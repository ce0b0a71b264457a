//! Request matching for classifier rules.
//!
//! # Design Decisions
//! - Path matching is case-sensitive and segment-aware
//! - No regex to guarantee O(n) matching

use axum::http::HeaderMap;

/// The parts of a request a classifier may look at.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyInput<'a> {
    /// Path as seen by backends (gateway prefix already removed).
    pub path: &'a str,
    pub body: &'a [u8],
    pub headers: &'a HeaderMap,
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    fn matches(&self, input: &ClassifyInput<'_>) -> bool;
}

/// Matches the request path prefix on a segment boundary.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_end_matches('/').to_string();
        Self { prefix }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, input: &ClassifyInput<'_>) -> bool {
        match input.path.strip_prefix(&self.prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || self.prefix.is_empty(),
            None => false,
        }
    }
}
