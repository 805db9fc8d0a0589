//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): requests by route class and outcome
//!   (`bypass`, `allowed`, `rejected`)
//! - `gate_rejections_total` (counter): rejections by reason
//! - `gate_tokens_issued_total` (counter): new tokens by reason
//!   (`missing`, `rotate`, `endpoint`)
//! - `gate_request_duration_seconds` (histogram): time spent in the gate
//!   and downstream, by class

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::ConfigError;
use crate::policy::RouteClass;

const DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Install the Prometheus recorder and its scrape listener.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), ConfigError> {
    PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)
        .and_then(|builder| builder.with_http_listener(addr).install())
        .map_err(|e| ConfigError::Invalid(format!("metrics exporter: {}", e)))?;

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(class: RouteClass, outcome: &'static str) {
    metrics::counter!(
        "gate_requests_total",
        "class" => class.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_rejection(reason: &'static str) {
    metrics::counter!("gate_rejections_total", "reason" => reason).increment(1);
}

pub fn record_token_issued(reason: &'static str) {
    metrics::counter!("gate_tokens_issued_total", "reason" => reason).increment(1);
}

pub fn record_duration(class: RouteClass, start: Instant) {
    metrics::histogram!(
        "gate_request_duration_seconds",
        "class" => class.as_str()
    )
    .record(start.elapsed().as_secs_f64());
}
