//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds and timeouts > 0)
//! - The request timeout must leave room for at least one forward attempt
//! - Check key material lengths for the credential cipher
//! - Check seed instances (parseable URLs, unique names)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{CacheProvider, GatewayConfig};

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("credentials.{field} must be exactly {expected} bytes, got {actual}")]
    KeyLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("instance '{name}' has an invalid base_url: {reason}")]
    InvalidUrl { name: String, reason: String },

    #[error("instance name '{0}' is declared more than once")]
    DuplicateInstance(String),

    #[error("instance at position {0} has an empty name or service_type")]
    EmptyIdentity(usize),

    #[error("cache.redis_url must be set when the redis provider is selected")]
    MissingRedisUrl,

    #[error("timeouts.request_secs ({request_ms}ms) must cover at least one forward attempt ({forward_ms}ms)")]
    RequestShorterThanForward { request_ms: u64, forward_ms: u64 },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let positives: [(&'static str, u64); 8] = [
        ("timeouts.forward_ms", config.timeouts.forward_ms),
        ("timeouts.classifier_ms", config.timeouts.classifier_ms),
        ("timeouts.request_secs", config.timeouts.request_secs),
        (
            "circuit_breaker.failure_threshold",
            config.circuit_breaker.failure_threshold as u64,
        ),
        (
            "circuit_breaker.reset_timeout_ms",
            config.circuit_breaker.reset_timeout_ms,
        ),
        (
            "circuit_breaker.failure_window_ms",
            config.circuit_breaker.failure_window_ms,
        ),
        ("health.window_capacity", config.health.window_capacity as u64),
        ("health.sweep_interval_secs", config.health.sweep_interval_secs),
    ];
    for (field, value) in positives {
        if value == 0 {
            errors.push(ValidationError::NotPositive { field });
        }
    }

    let request_ms = config.timeouts.request_secs.saturating_mul(1000);
    if request_ms < config.timeouts.forward_ms {
        errors.push(ValidationError::RequestShorterThanForward {
            request_ms,
            forward_ms: config.timeouts.forward_ms,
        });
    }

    if config.credentials.key.len() != 32 {
        errors.push(ValidationError::KeyLength {
            field: "key",
            expected: 32,
            actual: config.credentials.key.len(),
        });
    }
    if config.credentials.iv.len() != 16 {
        errors.push(ValidationError::KeyLength {
            field: "iv",
            expected: 16,
            actual: config.credentials.iv.len(),
        });
    }

    if config.cache.provider == CacheProvider::Redis && config.cache.redis_url.trim().is_empty() {
        errors.push(ValidationError::MissingRedisUrl);
    }

    let mut seen = HashSet::new();
    for (idx, instance) in config.instances.iter().enumerate() {
        if instance.name.trim().is_empty() || instance.service_type.trim().is_empty() {
            errors.push(ValidationError::EmptyIdentity(idx));
        }
        if let Err(e) = url::Url::parse(&instance.base_url) {
            errors.push(ValidationError::InvalidUrl {
                name: instance.name.clone(),
                reason: e.to_string(),
            });
        }
        if !seen.insert(instance.name.as_str()) {
            errors.push(ValidationError::DuplicateInstance(instance.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
