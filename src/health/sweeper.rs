//! Periodic metrics sweep.
//!
//! # Responsibilities
//! - Evict in-process metrics that have not been updated for a long time
//! - Purge expired entries of the in-process cache, when one is used

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::cache::MemoryCache;
use crate::config::HealthConfig;
use crate::health::metrics_store::MetricsStore;

pub struct MetricsSweeper {
    store: Arc<MetricsStore>,
    memory_cache: Option<MemoryCache>,
    interval: Duration,
    max_age: Duration,
}

impl MetricsSweeper {
    pub fn new(store: Arc<MetricsStore>, config: &HealthConfig) -> Self {
        Self {
            store,
            memory_cache: None,
            interval: Duration::from_secs(config.sweep_interval_secs),
            max_age: Duration::from_secs(config.stale_after_secs),
        }
    }

    /// Also purge expired entries of an in-process cache on every tick.
    pub fn with_memory_cache(mut self, cache: MemoryCache) -> Self {
        self.memory_cache = Some(cache);
        self
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_age_secs = self.max_age.as_secs(),
            "Metrics sweeper starting"
        );

        let mut ticker = time::interval(self.interval);
        // Ages are compared against timestamps, so late ticks are harmless.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Metrics sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub fn sweep_once(&self) -> usize {
        let removed = self.store.sweep_stale(self.max_age);
        if let Some(cache) = &self.memory_cache {
            let purged = cache.purge_expired();
            tracing::debug!(purged, "Purged expired cache entries");
        }
        if removed > 0 {
            tracing::info!(removed, "Swept stale instance metrics");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let cache = MemoryCache::new();
        let store = Arc::new(MetricsStore::new(Arc::new(cache.clone()), &HealthConfig::default()));
        let config = HealthConfig {
            sweep_interval_secs: 1,
            ..HealthConfig::default()
        };
        let sweeper = MetricsSweeper::new(store, &config).with_memory_cache(cache);

        let shutdown = Shutdown::new();
        let handle = tokio::spawn(sweeper.run(shutdown.subscribe()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should exit promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_once_keeps_recent_metrics() {
        let store = Arc::new(MetricsStore::new(Arc::new(MemoryCache::new()), &HealthConfig::default()));
        store.record_success("a", 5).await;
        let sweeper = MetricsSweeper::new(store.clone(), &HealthConfig::default());
        assert_eq!(sweeper.sweep_once(), 0);
        assert_eq!(store.all_snapshots().len(), 1);
    }
}
