//! Request classification.
//!
//! The gateway only depends on [`RouteClassifier`]; how a category is
//! chosen is up to the implementation. [`KeywordClassifier`] is the
//! built-in one, [`BoundedClassifier`] enforces the classification
//! deadline and fallback for any inner classifier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header;

use super::category::Category;
use super::matcher::{ClassifyInput, Matcher, PathPrefixMatcher};
use crate::config::ClassifierConfig;
use crate::resilience::with_deadline;

const PATH_WEIGHT: u32 = 2;
const BODY_WEIGHT: u32 = 1;

/// Maps a request to a service category.
///
/// Implementations must always return a category. Failure is expressed
/// as [`Category::Default`].
#[async_trait]
pub trait RouteClassifier: Send + Sync {
    async fn classify(&self, input: &ClassifyInput<'_>) -> Category;
}

/// Prefix rules first, then keyword scoring over path segments and body.
#[derive(Debug)]
pub struct KeywordClassifier {
    rules: Vec<(PathPrefixMatcher, Category)>,
    vocabulary: Vec<(Category, Vec<String>)>,
    max_body_scan_bytes: usize,
}

impl KeywordClassifier {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let rules = config
            .rules
            .iter()
            .map(|rule| (PathPrefixMatcher::new(rule.path_prefix.clone()), rule.category))
            .collect();

        let vocabulary = config
            .vocabulary
            .iter()
            .map(|set| {
                let keywords = set.keywords.iter().map(|k| k.to_ascii_lowercase()).collect();
                (set.category, keywords)
            })
            .collect();

        Self {
            rules,
            vocabulary,
            max_body_scan_bytes: config.max_body_scan_bytes,
        }
    }

    /// Synchronous classification; never fails.
    pub fn classify_now(&self, input: &ClassifyInput<'_>) -> Category {
        if let Some((_, category)) = self.rules.iter().find(|(m, _)| m.matches(input)) {
            return *category;
        }

        let segments: Vec<String> = input
            .path
            .split(|c| c == '/' || c == '-' || c == '_' || c == '.')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_lowercase())
            .collect();

        let body = if body_is_text(input) {
            let end = input.body.len().min(self.max_body_scan_bytes);
            String::from_utf8_lossy(&input.body[..end]).to_ascii_lowercase()
        } else {
            String::new()
        };

        let mut best = (Category::Default, 0u32);
        for (category, keywords) in &self.vocabulary {
            let score: u32 = keywords
                .iter()
                .map(|keyword| {
                    let path_hits = segments.iter().filter(|s| *s == keyword).count() as u32;
                    let body_hit = !body.is_empty() && body.contains(keyword.as_str());
                    path_hits * PATH_WEIGHT + u32::from(body_hit) * BODY_WEIGHT
                })
                .sum();

            // Strictly greater keeps the earlier category on ties.
            if score > best.1 {
                best = (*category, score);
            }
        }

        best.0
    }
}

#[async_trait]
impl RouteClassifier for KeywordClassifier {
    async fn classify(&self, input: &ClassifyInput<'_>) -> Category {
        self.classify_now(input)
    }
}

/// Binary bodies (uploads, images) are not scanned.
fn body_is_text(input: &ClassifyInput<'_>) -> bool {
    if input.body.is_empty() {
        return false;
    }
    match input
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        None => true,
        Some(ct) => {
            let ct = ct.to_ascii_lowercase();
            ct.contains("json")
                || ct.contains("xml")
                || ct.starts_with("text/")
                || ct.starts_with("application/x-www-form-urlencoded")
        }
    }
}

/// Always returns the same category.
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier(pub Category);

#[async_trait]
impl RouteClassifier for FixedClassifier {
    async fn classify(&self, _input: &ClassifyInput<'_>) -> Category {
        self.0
    }
}

/// Wraps a classifier with a deadline; late answers become `Default`.
pub struct BoundedClassifier {
    inner: Arc<dyn RouteClassifier>,
    deadline: Duration,
}

impl BoundedClassifier {
    pub fn new(inner: Arc<dyn RouteClassifier>, deadline: Duration) -> Self {
        Self { inner, deadline }
    }
}

#[async_trait]
impl RouteClassifier for BoundedClassifier {
    async fn classify(&self, input: &ClassifyInput<'_>) -> Category {
        match with_deadline(self.deadline, self.inner.classify(input)).await {
            Ok(category) => category,
            Err(elapsed) => {
                tracing::warn!(path = %input.path, error = %elapsed, "Classifier timed out, using default category");
                Category::Default
            }
        }
    }
}
