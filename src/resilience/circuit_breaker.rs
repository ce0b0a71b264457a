//! Circuit breaker for instance protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: instance assumed down, requests fail fast
//! - Half-Open: testing if instance recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold within window
//! Open → Half-Open: first can_call() after the reset timeout
//! Half-Open → Closed: trial request succeeds
//! Half-Open → Open: trial request fails
//! ```
//!
//! # Design Decisions
//! - Per-instance circuit breaker (not per service type)
//! - Records live in the shared cache so every gateway process sees them;
//!   a missing record means Closed
//! - Read-modify-write is serialized per instance inside one process;
//!   across processes the last write wins
//! - Never returns errors: cache trouble degrades to "assume healthy"

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::cache::{get_json, set_json, SharedCache};
use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Circuit state for one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds governing one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitPolicy {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub failure_window_ms: u64,
}

impl Default for CircuitPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            failure_window_ms: 60_000,
        }
    }
}

impl From<&CircuitBreakerConfig> for CircuitPolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            reset_timeout_ms: config.reset_timeout_ms,
            failure_window_ms: config.failure_window_ms,
        }
    }
}

impl CircuitPolicy {
    /// Apply only the overrides that are present.
    pub fn merge(self, overrides: &CircuitOverrides) -> Self {
        Self {
            failure_threshold: overrides.failure_threshold.unwrap_or(self.failure_threshold),
            reset_timeout_ms: overrides.reset_timeout_ms.unwrap_or(self.reset_timeout_ms),
            failure_window_ms: overrides.failure_window_ms.unwrap_or(self.failure_window_ms),
        }
    }

    fn reset_timeout(&self) -> chrono::Duration {
        millis(self.reset_timeout_ms)
    }

    fn failure_window(&self) -> chrono::Duration {
        millis(self.failure_window_ms)
    }
}

/// Saturates instead of wrapping for values past `i64::MAX`.
fn millis(ms: u64) -> chrono::Duration {
    chrono::Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

/// Partial policy update for `configure_circuit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitOverrides {
    pub failure_threshold: Option<u32>,
    pub reset_timeout_ms: Option<u64>,
    pub failure_window_ms: Option<u64>,
}

/// A state change produced by one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Persisted circuit state for one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitRecord {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_state_change_time: DateTime<Utc>,
    pub policy: CircuitPolicy,
}

impl CircuitRecord {
    pub fn new(policy: CircuitPolicy, now: DateTime<Utc>) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            last_state_change_time: now,
            policy,
        }
    }

    fn transition(&mut self, to: CircuitState, now: DateTime<Utc>) -> Option<Transition> {
        if self.state == to {
            return None;
        }
        let from = self.state;
        self.state = to;
        self.last_state_change_time = now;
        if to == CircuitState::Closed {
            self.failure_count = 0;
        }
        Some(Transition { from, to })
    }

    /// Whether a call may proceed. Moves Open → Half-Open once the reset
    /// timeout has elapsed.
    pub fn check(&mut self, now: DateTime<Utc>) -> (bool, Option<Transition>) {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => (true, None),
            CircuitState::Open => {
                if now - self.last_state_change_time > self.policy.reset_timeout() {
                    (true, self.transition(CircuitState::HalfOpen, now))
                } else {
                    (false, None)
                }
            }
        }
    }

    pub fn on_success(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        match self.state {
            CircuitState::HalfOpen => self.transition(CircuitState::Closed, now),
            _ => {
                self.failure_count = 0;
                None
            }
        }
    }

    pub fn on_failure(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        if self.state == CircuitState::Closed {
            // Failures older than the window no longer count.
            if let Some(last) = self.last_failure_time {
                if now - last > self.policy.failure_window() {
                    self.failure_count = 0;
                }
            }
        }
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_time = Some(now);

        match self.state {
            CircuitState::HalfOpen => self.transition(CircuitState::Open, now),
            CircuitState::Closed if self.failure_count >= self.policy.failure_threshold => {
                self.transition(CircuitState::Open, now)
            }
            _ => None,
        }
    }

    /// Administrative override: Closed with no failures on record.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        let transition = self.transition(CircuitState::Closed, now);
        self.failure_count = 0;
        self.last_failure_time = None;
        transition
    }
}

/// Per-instance circuit breakers backed by the shared cache.
pub struct CircuitBreaker {
    cache: Arc<dyn SharedCache>,
    defaults: CircuitPolicy,
    record_ttl: Duration,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("cache", &self.cache.provider_name())
            .field("defaults", &self.defaults)
            .field("record_ttl", &self.record_ttl)
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(cache: Arc<dyn SharedCache>, defaults: CircuitPolicy, record_ttl: Duration) -> Self {
        Self {
            cache,
            defaults,
            record_ttl,
            locks: DashMap::new(),
        }
    }

    pub fn from_config(cache: Arc<dyn SharedCache>, config: &CircuitBreakerConfig) -> Self {
        Self::new(
            cache,
            CircuitPolicy::from(config),
            Duration::from_secs(config.record_ttl_secs),
        )
    }

    pub fn defaults(&self) -> CircuitPolicy {
        self.defaults
    }

    /// Check whether `instance_id` may be called. Absent records are
    /// materialized as Closed.
    pub async fn can_call(&self, instance_id: &str) -> bool {
        let _guard = self.lock(instance_id).await;
        let now = Utc::now();
        let (mut record, existed) = self.load_or_default(instance_id, now).await;
        let (allowed, transition) = record.check(now);

        if !existed || transition.is_some() {
            self.store(instance_id, &record).await;
        }
        if let Some(t) = transition {
            self.announce(instance_id, t, &record);
        }
        allowed
    }

    pub async fn record_success(&self, instance_id: &str) {
        let _guard = self.lock(instance_id).await;
        let now = Utc::now();
        let (mut record, _) = self.load_or_default(instance_id, now).await;
        let transition = record.on_success(now);
        self.store(instance_id, &record).await;
        if let Some(t) = transition {
            self.announce(instance_id, t, &record);
        }
    }

    pub async fn record_failure(&self, instance_id: &str) {
        let _guard = self.lock(instance_id).await;
        let now = Utc::now();
        let (mut record, _) = self.load_or_default(instance_id, now).await;
        let transition = record.on_failure(now);
        self.store(instance_id, &record).await;
        if let Some(t) = transition {
            self.announce(instance_id, t, &record);
        }
    }

    /// Merge policy overrides into an instance's circuit, creating it if absent.
    pub async fn configure_circuit(&self, instance_id: &str, overrides: &CircuitOverrides) -> CircuitRecord {
        let _guard = self.lock(instance_id).await;
        let now = Utc::now();
        let (mut record, _) = self.load_or_default(instance_id, now).await;
        record.policy = record.policy.merge(overrides);
        self.store(instance_id, &record).await;
        tracing::info!(instance = %instance_id, policy = ?record.policy, "Circuit policy updated");
        record
    }

    /// Force the circuit Closed with a zero failure count. Idempotent.
    pub async fn reset_circuit(&self, instance_id: &str) {
        let _guard = self.lock(instance_id).await;
        let now = Utc::now();
        let (mut record, _) = self.load_or_default(instance_id, now).await;
        let transition = record.reset(now);
        self.store(instance_id, &record).await;
        if let Some(t) = transition {
            self.announce(instance_id, t, &record);
        }
        tracing::info!(instance = %instance_id, "Circuit manually reset to closed");
    }

    /// Current state without side effects. Closed when nothing is recorded.
    pub async fn circuit_state(&self, instance_id: &str) -> CircuitState {
        self.snapshot(instance_id)
            .await
            .map(|record| record.state)
            .unwrap_or(CircuitState::Closed)
    }

    pub async fn snapshot(&self, instance_id: &str) -> Option<CircuitRecord> {
        get_json(self.cache.as_ref(), &Self::key(instance_id)).await
    }

    fn key(instance_id: &str) -> String {
        format!("circuit:{}", instance_id)
    }

    async fn lock(&self, instance_id: &str) -> RecordGuard<'_> {
        let lock = self.locks.entry(instance_id.to_string()).or_default().clone();
        RecordGuard {
            guard: Some(lock.lock_owned().await),
            locks: &self.locks,
            instance_id: instance_id.to_string(),
        }
    }

    async fn load_or_default(&self, instance_id: &str, now: DateTime<Utc>) -> (CircuitRecord, bool) {
        match self.snapshot(instance_id).await {
            Some(record) => (record, true),
            None => (CircuitRecord::new(self.defaults, now), false),
        }
    }

    async fn store(&self, instance_id: &str, record: &CircuitRecord) {
        set_json(self.cache.as_ref(), &Self::key(instance_id), record, self.record_ttl).await;
    }

    fn announce(&self, instance_id: &str, transition: Transition, record: &CircuitRecord) {
        metrics::record_circuit_transition(instance_id, transition.to.as_str());
        match transition.to {
            CircuitState::Open => tracing::warn!(
                instance = %instance_id,
                from = %transition.from,
                failures = record.failure_count,
                "Circuit opened"
            ),
            CircuitState::HalfOpen => tracing::info!(
                instance = %instance_id,
                "Circuit half-open, allowing trial request"
            ),
            CircuitState::Closed => tracing::info!(
                instance = %instance_id,
                from = %transition.from,
                "Circuit closed"
            ),
        }
    }
}

/// Per-instance lock held for one read-modify-write. Releasing the last
/// holder drops the map entry, so ids that are never used again do not
/// accumulate.
struct RecordGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    instance_id: String,
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // A waiter still holds its clone of the Arc, so the count stays above one.
        self.locks
            .remove_if(&self.instance_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
