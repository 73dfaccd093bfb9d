//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define request, session and sweep metrics
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `waypost_requests_total` (counter): requests by method, status, route
//! - `waypost_request_duration_seconds` (histogram): latency by method, route
//! - `waypost_route_misses_total` (counter): requests no route matched
//! - `waypost_session_decode_failures_total` (counter): by failure kind
//! - `waypost_session_saves_total` (counter): by store and outcome
//! - `waypost_memory_sessions` (gauge): live in-memory sessions
//! - `waypost_memory_evictions_total` (counter): sessions removed by the sweep
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and start its HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one handled request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "waypost_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!(
        "waypost_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_route_miss() {
    counter!("waypost_route_misses_total").increment(1);
}

pub fn record_session_decode_failure(kind: &'static str) {
    counter!("waypost_session_decode_failures_total", "kind" => kind).increment(1);
}

pub fn record_session_save(store: &'static str, outcome: &'static str) {
    counter!("waypost_session_saves_total", "store" => store, "outcome" => outcome).increment(1);
}

pub fn record_memory_sessions(count: usize) {
    gauge!("waypost_memory_sessions").set(count as f64);
}

pub fn record_memory_evictions(count: usize) {
    counter!("waypost_memory_evictions_total").increment(count as u64);
}
