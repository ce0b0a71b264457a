//! Per-instance request metrics.
//!
//! # Responsibilities
//! - Count requests and errors per instance
//! - Keep a bounded window of recent latencies (FIFO eviction)
//! - Derive error rate and health score
//! - Mirror records into the shared cache for other gateway processes
//!
//! # Design Decisions
//! - The in-process map is the fast path; the cache is read through on a
//!   local miss and written after every update (best effort)
//! - Each update happens under the map's per-key entry lock, so concurrent
//!   requests against one instance never lose increments within a process
//! - Sweeping stale entries only touches the in-process map

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::cache::{get_json, set_json, SharedCache};
use crate::config::HealthConfig;
use crate::health::score::{health_score, ScoringPolicy};

/// Rolling counters for one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceMetrics {
    pub instance_id: String,
    pub request_count: u64,
    pub error_count: u64,
    /// Most recent latencies in milliseconds, oldest first.
    pub response_times: VecDeque<u64>,
    /// Percentage of requests that failed.
    pub error_rate: f64,
    pub last_updated: DateTime<Utc>,
}

impl InstanceMetrics {
    pub fn new(instance_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            request_count: 0,
            error_count: 0,
            response_times: VecDeque::new(),
            error_rate: 0.0,
            last_updated: now,
        }
    }

    /// Fold one observed request into the counters.
    pub fn record(&mut self, latency_ms: u64, failed: bool, capacity: usize, now: DateTime<Utc>) {
        self.request_count += 1;
        if failed {
            self.error_count += 1;
        }

        self.response_times.push_back(latency_ms);
        while self.response_times.len() > capacity {
            self.response_times.pop_front();
        }

        self.error_rate = (self.error_count as f64 / self.request_count as f64) * 100.0;
        self.last_updated = now;
    }

    /// `None` when no latency has been recorded yet.
    pub fn average_latency_ms(&self) -> Option<f64> {
        if self.response_times.is_empty() {
            return None;
        }
        let sum: u64 = self.response_times.iter().sum();
        Some(sum as f64 / self.response_times.len() as f64)
    }
}

/// Keyed store of `InstanceMetrics`.
pub struct MetricsStore {
    local: DashMap<String, InstanceMetrics>,
    cache: Arc<dyn SharedCache>,
    policy: ScoringPolicy,
    window_capacity: usize,
    record_ttl: Duration,
}

impl std::fmt::Debug for MetricsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsStore")
            .field("tracked", &self.local.len())
            .field("policy", &self.policy)
            .field("window_capacity", &self.window_capacity)
            .finish()
    }
}

impl MetricsStore {
    pub fn new(cache: Arc<dyn SharedCache>, config: &HealthConfig) -> Self {
        Self {
            local: DashMap::new(),
            cache,
            policy: ScoringPolicy::from(config),
            window_capacity: config.window_capacity,
            record_ttl: Duration::from_secs(config.record_ttl_secs),
        }
    }

    pub async fn record_success(&self, instance_id: &str, latency_ms: u64) {
        self.record(instance_id, latency_ms, false).await;
    }

    pub async fn record_failure(&self, instance_id: &str, latency_ms: u64) {
        self.record(instance_id, latency_ms, true).await;
    }

    /// Health score in `[0, 100]`; 100 for instances with no metrics.
    pub async fn health_score(&self, instance_id: &str) -> u8 {
        let metrics = self.snapshot(instance_id).await;
        health_score(metrics.as_ref(), &self.policy, Utc::now())
    }

    /// Score an already fetched snapshot.
    pub fn score(&self, metrics: &InstanceMetrics) -> u8 {
        health_score(Some(metrics), &self.policy, Utc::now())
    }

    /// Local record, or the shared cache's copy when this process has none.
    pub async fn snapshot(&self, instance_id: &str) -> Option<InstanceMetrics> {
        if let Some(local) = self.local.get(instance_id) {
            return Some(local.value().clone());
        }
        let cached: InstanceMetrics = get_json(self.cache.as_ref(), &Self::key(instance_id)).await?;
        let adopted = self
            .local
            .entry(instance_id.to_string())
            .or_insert(cached)
            .value()
            .clone();
        Some(adopted)
    }

    /// Every record held by this process, ordered by instance id.
    pub fn all_snapshots(&self) -> Vec<InstanceMetrics> {
        let mut all: Vec<InstanceMetrics> = self.local.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        all
    }

    /// Drop in-process records not updated within `max_age`.
    pub fn sweep_stale(&self, max_age: Duration) -> usize {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let cutoff = Utc::now() - max_age;
        let before = self.local.len();
        self.local.retain(|instance_id, metrics| {
            let keep = metrics.last_updated >= cutoff;
            if !keep {
                tracing::info!(instance = %instance_id, "Cleaned up stale metrics");
            }
            keep
        });
        before.saturating_sub(self.local.len())
    }

    async fn record(&self, instance_id: &str, latency_ms: u64, failed: bool) {
        if !self.local.contains_key(instance_id) {
            // Continue from another process's counters when available.
            let _ = self.snapshot(instance_id).await;
        }

        let now = Utc::now();
        let updated = {
            let mut entry = self
                .local
                .entry(instance_id.to_string())
                .or_insert_with(|| InstanceMetrics::new(instance_id, now));
            entry.record(latency_ms, failed, self.window_capacity, now);
            entry.value().clone()
        };

        set_json(self.cache.as_ref(), &Self::key(instance_id), &updated, self.record_ttl).await;
    }

    fn key(instance_id: &str) -> String {
        format!("metrics:{}", instance_id)
    }
}
