//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_dispositions_total` (counter): outcome per request, by route class
//! - `gate_provider_calls_total` (counter): identity calls by operation, outcome
//! - `gate_resolution_duration_seconds` (histogram): session resolution latency
//! - `gate_upstream_requests_total` (counter): forwarded requests by status
//!
//! # Design Decisions
//! - Low-overhead metric updates; no-ops until a recorder is installed
//! - Labels are static strings or status codes, never user data

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::auth::AuthResult;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the final disposition of a gated request.
pub fn record_disposition(disposition: &'static str, route_class: &'static str) {
    counter!(
        "gate_dispositions_total",
        "disposition" => disposition,
        "route_class" => route_class
    )
    .increment(1);
}

/// Record one identity provider or profile store call.
pub fn record_provider_call<T>(operation: &'static str, result: &AuthResult<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    counter!(
        "gate_provider_calls_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record how long session resolution took.
pub fn record_resolution(start: Instant) {
    histogram!("gate_resolution_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record a forwarded request's upstream status.
pub fn record_upstream(status: u16) {
    counter!("gate_upstream_requests_total", "status" => status.to_string()).increment(1);
}
