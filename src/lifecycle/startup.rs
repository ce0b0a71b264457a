//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Seed the registry from configuration
//! - Hand back the gateway and its background sweeper
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Collaborators (cache, store, forwarder) can be supplied by the caller

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cache::{build_cache, CacheError, MemoryCache, SharedCache};
use crate::config::{CacheProvider, GatewayConfig};
use crate::gateway::{ForwardError, Forwarder, HttpForwarder, SmartGateway};
use crate::health::{MetricsStore, MetricsSweeper};
use crate::registry::{InMemoryRegistryStore, RegistryError, RegistryStore, ServiceRegistry};
use crate::resilience::CircuitBreaker;
use crate::routing::{BoundedClassifier, KeywordClassifier, RegionResolver, RouteClassifier};
use crate::security::{AesCbcCipher, CredentialError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cache initialization failed: {0}")]
    Cache(#[from] CacheError),

    #[error("credential cipher initialization failed: {0}")]
    Credential(#[from] CredentialError),

    #[error("registry seeding failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("http client initialization failed: {0}")]
    Forwarder(#[from] ForwardError),
}

/// Fully wired gateway plus the background task that maintains it.
pub struct Assembly {
    pub gateway: Arc<SmartGateway>,
    pub sweeper: MetricsSweeper,
}

/// External collaborators the gateway is built around.
pub struct Collaborators {
    pub cache: Arc<dyn SharedCache>,
    /// Set when `cache` is in-process so the sweeper can purge it.
    pub memory_cache: Option<MemoryCache>,
    pub store: Arc<dyn RegistryStore>,
    pub forwarder: Arc<dyn Forwarder>,
    pub classifier: Arc<dyn RouteClassifier>,
}

impl Collaborators {
    /// Production collaborators described by `config`.
    pub async fn from_config(config: &GatewayConfig) -> Result<Self, StartupError> {
        let (cache, memory_cache): (Arc<dyn SharedCache>, _) = match config.cache.provider {
            CacheProvider::Memory => {
                let memory = MemoryCache::new();
                (Arc::new(memory.clone()), Some(memory))
            }
            _ => (build_cache(&config.cache).await?, None),
        };
        tracing::info!(provider = cache.provider_name(), "Shared cache ready");

        let forwarder = HttpForwarder::new(Duration::from_millis(config.timeouts.forward_ms))?;

        Ok(Self {
            cache,
            memory_cache,
            store: Arc::new(InMemoryRegistryStore::new()),
            forwarder: Arc::new(forwarder),
            classifier: Arc::new(KeywordClassifier::from_config(&config.classifier)),
        })
    }
}

/// Wire every subsystem and seed configured instances.
pub async fn assemble(config: &GatewayConfig, parts: Collaborators) -> Result<Assembly, StartupError> {
    let cipher = Arc::new(AesCbcCipher::from_config(&config.credentials)?);
    let breaker = Arc::new(CircuitBreaker::from_config(parts.cache.clone(), &config.circuit_breaker));
    let metrics = Arc::new(MetricsStore::new(parts.cache.clone(), &config.health));

    let registry = Arc::new(ServiceRegistry::new(
        parts.store,
        cipher,
        breaker.clone(),
        parts.cache,
        Duration::from_secs(config.cache.directory_ttl_secs),
    ));
    let seeded = registry.seed(&config.instances).await?;
    tracing::info!(seeded, configured = config.instances.len(), "Service registry seeded");

    let classifier = Arc::new(BoundedClassifier::new(
        parts.classifier,
        Duration::from_millis(config.timeouts.classifier_ms),
    ));

    let gateway = Arc::new(
        SmartGateway::new(
            classifier,
            RegionResolver::from_config(&config.region),
            registry,
            metrics.clone(),
            breaker,
            parts.forwarder,
            Duration::from_millis(config.timeouts.forward_ms),
        )
        .with_request_timeout(Duration::from_secs(config.timeouts.request_secs)),
    );

    let mut sweeper = MetricsSweeper::new(metrics, &config.health);
    if let Some(memory) = parts.memory_cache {
        sweeper = sweeper.with_memory_cache(memory);
    }

    Ok(Assembly { gateway, sweeper })
}
