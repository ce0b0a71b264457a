//! The smart gateway request lifecycle.
//!
//! ```text
//! classify → region → candidates → rank by health → for each candidate:
//!     circuit open?  skip
//!     forward (deadline)
//!         ok    → record success, return
//!         error → record failure, fail over
//! exhausted → AllInstancesUnavailable
//! ```
//!
//! Each candidate is tried at most once per request. Latency is measured
//! per attempt.
//!
//! An optional request deadline bounds the whole pass. Every attempt gets
//! `min(forward_timeout, time left)`, and once nothing is left the pass
//! ends in `AllInstancesUnavailable` with every started attempt recorded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;

use super::error::GatewayError;
use super::forwarder::{ForwardError, Forwarder};
use super::request::{GatewayRequest, GatewayResponse};
use crate::health::MetricsStore;
use crate::observability::metrics;
use crate::registry::{ServiceInstance, ServiceRegistry};
use crate::resilience::{with_deadline, CircuitBreaker, CircuitOverrides, CircuitRecord, CircuitState};
use crate::routing::{Category, ClassifyInput, RegionResolver, RouteClassifier};

/// Per-request routing plan. Never persisted.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub category: Category,
    pub region: Option<String>,
    /// Best first; equal scores keep registry order.
    pub ranked: Vec<(ServiceInstance, u8)>,
}

/// One row of the admin health report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatusEntry {
    pub instance_id: String,
    pub health_score: u8,
    pub error_rate: f64,
    pub avg_response_time_ms: Option<f64>,
    pub request_count: u64,
    pub error_count: u64,
    pub circuit_state: CircuitState,
    pub last_updated: DateTime<Utc>,
}

pub struct SmartGateway {
    classifier: Arc<dyn RouteClassifier>,
    regions: RegionResolver,
    registry: Arc<ServiceRegistry>,
    metrics: Arc<MetricsStore>,
    breaker: Arc<CircuitBreaker>,
    forwarder: Arc<dyn Forwarder>,
    forward_timeout: Duration,
    request_timeout: Option<Duration>,
}

impl std::fmt::Debug for SmartGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartGateway")
            .field("regions", &self.regions)
            .field("registry", &self.registry)
            .field("forward_timeout", &self.forward_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl SmartGateway {
    pub fn new(
        classifier: Arc<dyn RouteClassifier>,
        regions: RegionResolver,
        registry: Arc<ServiceRegistry>,
        metrics: Arc<MetricsStore>,
        breaker: Arc<CircuitBreaker>,
        forwarder: Arc<dyn Forwarder>,
        forward_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            regions,
            registry,
            metrics,
            breaker,
            forwarder,
            forward_timeout,
            request_timeout: None,
        }
    }

    /// Bound every routed request, failover included, by `timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Deadline for a request arriving now, if one is configured.
    pub fn deadline_from_now(&self) -> Option<Instant> {
        self.request_timeout.and_then(|t| Instant::now().checked_add(t))
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<MetricsStore> {
        &self.metrics
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Classify, resolve the region and rank candidates by health.
    pub async fn plan(&self, request: &GatewayRequest) -> Result<RoutingDecision, GatewayError> {
        let input = ClassifyInput {
            path: &request.path,
            body: &request.body,
            headers: &request.headers,
        };
        let category = self.classifier.classify(&input).await;
        let region = self.regions.resolve(&request.headers);
        let service_type = category.service_type();

        let candidates = self.registry.candidates(service_type, region.as_deref()).await?;
        if candidates.is_empty() {
            return Err(GatewayError::NoInstances {
                service_type: service_type.to_string(),
            });
        }

        let scores = join_all(candidates.iter().map(|i| self.metrics.health_score(&i.name))).await;
        let mut ranked: Vec<(ServiceInstance, u8)> = candidates.into_iter().zip(scores).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        tracing::debug!(
            category = %category,
            region = ?region,
            candidates = ?ranked.iter().map(|(i, s)| (i.name.as_str(), *s)).collect::<Vec<_>>(),
            "Routing decision"
        );

        Ok(RoutingDecision {
            category,
            region,
            ranked,
        })
    }

    /// Route one request, failing over through ranked candidates.
    pub async fn route(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        self.route_until(request, self.deadline_from_now()).await
    }

    /// Like `route`, with an explicit overall deadline (`None` is unbounded).
    pub async fn route_until(
        &self,
        request: GatewayRequest,
        deadline: Option<Instant>,
    ) -> Result<GatewayResponse, GatewayError> {
        let decision = match self.plan(&request).await {
            Ok(decision) => decision,
            Err(e) => {
                metrics::record_request("unclassified", "rejected");
                return Err(e);
            }
        };
        let category = decision.category;
        let service_type = category.service_type();

        let mut attempted = 0usize;
        let mut skipped = 0usize;
        let mut untried = 0usize;

        for (position, (instance, score)) in decision.ranked.iter().enumerate() {
            // Checked before the circuit so a trial call is never granted
            // without an attempt following it.
            let budget = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => self.forward_timeout,
            }
            .min(self.forward_timeout);
            if budget.is_zero() {
                untried = decision.ranked.len() - position;
                tracing::warn!(
                    category = %category,
                    attempted,
                    untried,
                    "Request deadline reached before every instance was tried"
                );
                break;
            }

            if !self.breaker.can_call(&instance.name).await {
                tracing::debug!(instance = %instance.name, "Circuit open, skipping instance");
                skipped += 1;
                continue;
            }

            if attempted > 0 {
                tracing::info!(
                    category = %category,
                    instance = %instance.name,
                    attempt = attempted + 1,
                    "Failing over to next instance"
                );
                metrics::record_failover(category.keyword());
            }
            attempted += 1;

            let started = Instant::now();
            let outcome = self.attempt(instance, &request, budget).await;
            let latency = started.elapsed();
            let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);

            match outcome {
                Ok(response) => {
                    self.metrics.record_success(&instance.name, latency_ms).await;
                    self.breaker.record_success(&instance.name).await;
                    metrics::record_forward(&instance.name, true, latency);
                    metrics::record_request(category.keyword(), "success");
                    tracing::debug!(
                        instance = %instance.name,
                        health_score = score,
                        latency_ms,
                        status = %response.status,
                        "Request forwarded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!(
                        instance = %instance.name,
                        kind = e.kind(),
                        error = %e,
                        latency_ms,
                        "Forwarding failed"
                    );
                    self.metrics.record_failure(&instance.name, latency_ms).await;
                    self.breaker.record_failure(&instance.name).await;
                    metrics::record_forward(&instance.name, false, latency);
                }
            }
        }

        tracing::error!(
            category = %category,
            service_type = %service_type,
            attempted,
            skipped,
            untried,
            "All instances unavailable"
        );
        metrics::record_request(category.keyword(), "exhausted");
        Err(GatewayError::AllInstancesUnavailable {
            service_type: service_type.to_string(),
            attempted,
            skipped,
        })
    }

    async fn attempt(
        &self,
        instance: &ServiceInstance,
        request: &GatewayRequest,
        budget: Duration,
    ) -> Result<GatewayResponse, ForwardError> {
        let credential = self.registry.decrypt_credential(instance)?;
        with_deadline(
            budget,
            self.forwarder.forward(instance, &credential, request),
        )
        .await
        .map_err(|elapsed| ForwardError::Timeout(elapsed.0))?
    }

    /// Snapshot of every instance this process has metrics for.
    pub async fn health_status(&self) -> Vec<HealthStatusEntry> {
        let mut entries = Vec::new();
        for snapshot in self.metrics.all_snapshots() {
            let health_score = self.metrics.score(&snapshot);
            metrics::record_health_score(&snapshot.instance_id, health_score);
            let circuit_state = self.breaker.circuit_state(&snapshot.instance_id).await;
            entries.push(HealthStatusEntry {
                health_score,
                error_rate: snapshot.error_rate,
                avg_response_time_ms: snapshot.average_latency_ms(),
                request_count: snapshot.request_count,
                error_count: snapshot.error_count,
                circuit_state,
                last_updated: snapshot.last_updated,
                instance_id: snapshot.instance_id,
            });
        }
        entries
    }

    pub async fn reset_circuit(&self, instance_id: &str) {
        self.breaker.reset_circuit(instance_id).await;
    }

    pub async fn configure_circuit(&self, instance_id: &str, overrides: &CircuitOverrides) -> CircuitRecord {
        self.breaker.configure_circuit(instance_id, overrides).await
    }
}
