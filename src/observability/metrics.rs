//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): routed requests by category, outcome
//! - `gateway_forward_duration_seconds` (histogram): per-attempt latency
//! - `gateway_failovers_total` (counter): advances to the next candidate
//! - `gateway_circuit_transitions_total` (counter): circuit state changes
//! - `gateway_instance_health_score` (gauge): last computed health score
//!
//! Recording without an installed exporter is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Outcome of one routed request.
pub fn record_request(category: &str, outcome: &'static str) {
    metrics::counter!(
        "gateway_requests_total",
        "category" => category.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// One forwarding attempt against an instance.
pub fn record_forward(instance: &str, success: bool, latency: Duration) {
    let outcome = if success { "success" } else { "failure" };
    metrics::histogram!(
        "gateway_forward_duration_seconds",
        "instance" => instance.to_string(),
        "outcome" => outcome
    )
    .record(latency.as_secs_f64());
}

pub fn record_failover(category: &str) {
    metrics::counter!("gateway_failovers_total", "category" => category.to_string()).increment(1);
}

pub fn record_circuit_transition(instance: &str, to: &'static str) {
    metrics::counter!(
        "gateway_circuit_transitions_total",
        "instance" => instance.to_string(),
        "to" => to
    )
    .increment(1);
}

pub fn record_health_score(instance: &str, score: u8) {
    metrics::gauge!("gateway_instance_health_score", "instance" => instance.to_string())
        .set(score as f64);
}
