//! Health scoring.
//!
//! ```text
//! score = 100
//!       - error_rate_percent
//!       - min(max_latency_penalty, floor((avg_latency - threshold) / 100ms))   if avg > threshold
//!       - recency_penalty                                                   if errors and updated recently
//! clamped to [0, 100]
//! ```
//!
//! Unknown instances score 100 so that new deployments are not penalized.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::HealthConfig;
use crate::health::metrics_store::InstanceMetrics;

pub const MAX_SCORE: u8 = 100;

const LATENCY_STEP_MS: f64 = 100.0;

/// Weights applied by `health_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPolicy {
    pub latency_threshold_ms: u64,
    pub max_latency_penalty: u32,
    pub recency_window: Duration,
    pub recency_penalty: u32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

impl From<&HealthConfig> for ScoringPolicy {
    fn from(config: &HealthConfig) -> Self {
        Self {
            latency_threshold_ms: config.latency_threshold_ms,
            max_latency_penalty: config.max_latency_penalty,
            recency_window: Duration::from_secs(config.recency_window_secs),
            recency_penalty: config.recency_penalty,
        }
    }
}

/// Compute the 0–100 health score for an instance.
pub fn health_score(metrics: Option<&InstanceMetrics>, policy: &ScoringPolicy, now: DateTime<Utc>) -> u8 {
    let Some(metrics) = metrics else {
        return MAX_SCORE;
    };

    let mut score = f64::from(MAX_SCORE) - metrics.error_rate;

    if let Some(avg) = metrics.average_latency_ms() {
        let threshold = policy.latency_threshold_ms as f64;
        if avg > threshold {
            let penalty = ((avg - threshold) / LATENCY_STEP_MS).floor();
            score -= penalty.min(f64::from(policy.max_latency_penalty));
        }
    }

    if metrics.error_rate > 0.0 {
        let age = (now - metrics.last_updated).to_std().unwrap_or(Duration::ZERO);
        if age < policy.recency_window {
            score -= f64::from(policy.recency_penalty);
        }
    }

    // Fractional error rates round down.
    score.clamp(0.0, f64::from(MAX_SCORE)).floor() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn metrics(requests: u64, errors: u64, latency_ms: u64, age_secs: i64) -> InstanceMetrics {
        let now = Utc::now();
        let mut m = InstanceMetrics::new("svc", now);
        for i in 0..requests {
            m.record(latency_ms, i < errors, 100, now);
        }
        m.last_updated = now - chrono::Duration::seconds(age_secs);
        m
    }

    #[test]
    fn test_unknown_instance_scores_perfect() {
        assert_eq!(health_score(None, &ScoringPolicy::default(), Utc::now()), 100);
    }

    #[test]
    fn test_no_requests_scores_perfect() {
        let m = metrics(0, 0, 0, 0);
        assert_eq!(health_score(Some(&m), &ScoringPolicy::default(), Utc::now()), 100);
    }

    #[test]
    fn test_error_rate_and_recency() {
        let policy = ScoringPolicy::default();
        // 10% errors, updated just now: 100 - 10 - 10
        assert_eq!(health_score(Some(&metrics(10, 1, 50, 0)), &policy, Utc::now()), 80);
        // Same errors, updated two minutes ago: no recency penalty
        assert_eq!(health_score(Some(&metrics(10, 1, 50, 120)), &policy, Utc::now()), 90);
    }

    #[test]
    fn test_latency_penalty_is_capped() {
        let policy = ScoringPolicy::default();
        assert_eq!(health_score(Some(&metrics(4, 0, 1500, 0)), &policy, Utc::now()), 95);
        assert_eq!(health_score(Some(&metrics(4, 0, 1099, 0)), &policy, Utc::now()), 100);
        assert_eq!(health_score(Some(&metrics(4, 0, 60_000, 0)), &policy, Utc::now()), 80);
    }

    #[test]
    fn test_total_failure_clamps_to_zero() {
        let m = metrics(10, 10, 30_000, 0);
        assert_eq!(health_score(Some(&m), &ScoringPolicy::default(), Utc::now()), 0);
    }

    /// The formula without the final clamp.
    fn unclamped(m: &InstanceMetrics, policy: &ScoringPolicy, now: DateTime<Utc>) -> f64 {
        let mut raw = 100.0 - m.error_rate;
        if let Some(avg) = m.average_latency_ms() {
            let over = avg - policy.latency_threshold_ms as f64;
            if over > 0.0 {
                raw -= (over / 100.0).floor().min(f64::from(policy.max_latency_penalty));
            }
        }
        let recent = chrono::Duration::from_std(policy.recency_window).unwrap();
        if m.error_rate > 0.0 && now - m.last_updated < recent {
            raw -= f64::from(policy.recency_penalty);
        }
        raw
    }

    proptest! {
        #[test]
        fn prop_score_is_clamped_formula(
            requests in 0u64..300,
            error_ratio in 0.0f64..=1.0,
            latency in 0u64..120_000,
            age in 0i64..200_000,
        ) {
            let errors = (requests as f64 * error_ratio) as u64;
            let m = metrics(requests, errors, latency, age);
            let policy = ScoringPolicy::default();
            let now = Utc::now();

            let score = health_score(Some(&m), &policy, now);
            let raw = unclamped(&m, &policy, now);
            if raw <= 0.0 {
                prop_assert_eq!(score, 0);
            } else if raw >= 100.0 {
                prop_assert_eq!(score, 100);
            } else {
                prop_assert_eq!(f64::from(score), raw.floor());
            }
        }

        #[test]
        fn prop_total_failure_scores_zero(requests in 1u64..300, latency in 0u64..120_000) {
            let m = metrics(requests, requests, latency, 0);
            prop_assert!(unclamped(&m, &ScoringPolicy::default(), Utc::now()) < 0.0);
            prop_assert_eq!(health_score(Some(&m), &ScoringPolicy::default(), Utc::now()), 0);
        }
    }
}
