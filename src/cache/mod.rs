//! Shared key-value cache.
//!
//! # Data Flow
//! ```text
//! circuit breaker ──┐
//! metrics store  ───┼─→ SharedCache (JSON blobs, per-key TTL)
//! registry       ───┘        ├─ memory.rs (in-process, default)
//!                            └─ redis.rs  (cross-process, `cache-redis` feature)
//! ```
//!
//! # Design Decisions
//! - A missing key means "no information", never an error
//! - Callers treat cache failures as misses and log them
//! - Values are JSON strings so every provider stores the same bytes

pub mod memory;
#[cfg(feature = "cache-redis")]
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use memory::MemoryCache;
#[cfg(feature = "cache-redis")]
pub use self::redis::RedisCache;

use crate::config::{CacheConfig, CacheProvider};

/// Errors raised by cache providers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache backend error: {0}")]
    Backend(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Key → JSON blob store with per-key TTL.
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// `Ok(None)` on a miss.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    fn provider_name(&self) -> &'static str;
}

/// Read and decode a typed value. Failures are logged and reported as a miss.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn SharedCache, key: &str) -> Option<T> {
    let raw = match cache.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key = %key, provider = cache.provider_name(), error = %e, "Cache read failed, treating as miss");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
            None
        }
    }
}

/// Encode and write a typed value. Failures are logged, never propagated.
pub async fn set_json<T: Serialize>(cache: &dyn SharedCache, key: &str, value: &T, ttl: Duration) {
    let outcome = match serde_json::to_string(value) {
        Ok(raw) => cache.set(key, &raw, ttl).await,
        Err(e) => Err(CacheError::from(e)),
    };
    if let Err(e) = outcome {
        tracing::warn!(key = %key, provider = cache.provider_name(), error = %e, "Cache write failed");
    }
}

/// Build the configured cache provider.
pub async fn build_cache(config: &CacheConfig) -> CacheResult<Arc<dyn SharedCache>> {
    match config.provider {
        CacheProvider::Memory => Ok(Arc::new(MemoryCache::new())),
        #[cfg(feature = "cache-redis")]
        CacheProvider::Redis => Ok(Arc::new(RedisCache::connect(&config.redis_url).await?)),
        #[cfg(not(feature = "cache-redis"))]
        CacheProvider::Redis => Err(CacheError::Connection(
            "redis provider requested but the `cache-redis` feature is not enabled".to_string(),
        )),
    }
}
