//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::routing::Category;

/// Root configuration for the smart gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Default circuit breaker policy applied to every instance.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Health scoring and metrics retention.
    pub health: HealthConfig,

    /// Shared cache provider.
    pub cache: CacheConfig,

    /// Region hint extraction.
    pub region: RegionConfig,

    /// Request classification.
    pub classifier: ClassifierConfig,

    /// Credential encryption at rest.
    pub credentials: CredentialConfig,

    /// Service instances registered at startup.
    pub instances: Vec<InstanceConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum inbound request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Timeout configuration for the request lifecycle.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total inbound request timeout in seconds (covers every failover attempt).
    pub request_secs: u64,

    /// Per-instance forwarding timeout in milliseconds.
    pub forward_ms: u64,

    /// Classifier deadline in milliseconds.
    pub classifier_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 120,
            forward_ms: 30_000,
            classifier_ms: 250,
        }
    }
}

/// Circuit breaker defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures within the window that open the circuit.
    pub failure_threshold: u32,

    /// Time an open circuit waits before allowing a trial call.
    pub reset_timeout_ms: u64,

    /// Window in which failures are counted towards the threshold.
    pub failure_window_ms: u64,

    /// TTL of circuit records in the shared cache.
    pub record_ttl_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            failure_window_ms: 60_000,
            record_ttl_secs: 3600,
        }
    }
}

/// Health scoring and metrics retention.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Number of latency samples kept per instance.
    pub window_capacity: usize,

    /// In-process metrics older than this are swept.
    pub stale_after_secs: u64,

    /// Interval of the background sweep.
    pub sweep_interval_secs: u64,

    /// Errors updated within this window add the recency penalty.
    pub recency_window_secs: u64,

    /// Average latency above this starts costing points.
    pub latency_threshold_ms: u64,

    /// Cap on the latency penalty.
    pub max_latency_penalty: u32,

    /// Flat penalty for recent errors.
    pub recency_penalty: u32,

    /// TTL of metrics records in the shared cache.
    pub record_ttl_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            window_capacity: 100,
            stale_after_secs: 86_400,
            sweep_interval_secs: 3600,
            recency_window_secs: 60,
            latency_threshold_ms: 1000,
            max_latency_penalty: 20,
            recency_penalty: 10,
            record_ttl_secs: 3600,
        }
    }
}

/// Which shared cache backs circuit, metrics and registry state.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheProvider {
    #[default]
    Memory,
    Redis,
}

/// Shared cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub provider: CacheProvider,

    /// Redis connection URL (only used by the `redis` provider).
    pub redis_url: String,

    /// TTL of the registry's service URL directory.
    pub directory_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: CacheProvider::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            directory_ttl_secs: 3600,
        }
    }
}

/// Region hint extraction.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Header carrying an explicit region preference.
    pub hint_header: String,

    /// Region assumed for requests arriving through a forwarding proxy.
    pub forwarded_for_region: Option<String>,

    /// Accept-Language tag → region.
    pub accept_language: BTreeMap<String, String>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        let mut accept_language = BTreeMap::new();
        accept_language.insert("en-US".to_string(), "us-east".to_string());
        accept_language.insert("en-GB".to_string(), "eu-west".to_string());
        Self {
            hint_header: "x-preferred-region".to_string(),
            forwarded_for_region: Some("us-east".to_string()),
            accept_language,
        }
    }
}

/// A path prefix pinned to a category, checked before keyword scoring.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierRule {
    pub path_prefix: String,
    pub category: Category,
}

/// Keywords that vote for a category.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeywordSet {
    pub category: Category,
    pub keywords: Vec<String>,
}

/// Request classification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Prefix rules, first match wins.
    pub rules: Vec<ClassifierRule>,

    /// Keyword vocabulary per category.
    pub vocabulary: Vec<KeywordSet>,

    /// Maximum body bytes inspected for keywords.
    pub max_body_scan_bytes: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let vocabulary = Category::ROUTABLE
            .iter()
            .map(|category| KeywordSet {
                category: *category,
                keywords: vec![category.keyword().to_string(), format!("{}s", category.keyword())],
            })
            .collect();
        Self {
            rules: Vec::new(),
            vocabulary,
            max_body_scan_bytes: 64 * 1024,
        }
    }
}

/// Credential encryption key material.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// AES-256 key, exactly 32 bytes.
    pub key: String,

    /// CBC initialization vector, exactly 16 bytes.
    pub iv: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            // WARNING: development placeholders. Override in production.
            key: "12345678901234567890123456789012".to_string(),
            iv: "1234567890123456".to_string(),
        }
    }
}

/// A service instance registered at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceConfig {
    /// Unique instance name.
    pub name: String,

    /// Service category this instance serves (e.g., "payment-gateway").
    pub service_type: String,

    /// Base URL requests are forwarded to.
    pub base_url: String,

    /// Plaintext credential; encrypted before it reaches the registry store.
    pub credential: String,

    #[serde(default)]
    pub region: Option<String>,

    /// Higher is preferred.
    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_active() -> bool {
    true
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token required on admin routes. Unset leaves them open.
    pub api_key: Option<String>,
}
