//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy and relay metrics
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `relay_sessions_total` (counter): relays by mode
//! - `relay_active_sessions` (gauge): relays still moving bytes
//! - `relay_bytes_total` (counter): bytes relayed by direction
//! - `relay_copy_errors_total` (counter): failed directions
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels are low-cardinality (no session IDs)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed plain HTTP request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("proxy_requests_total", "method" => method.to_string(), "status" => status.clone())
        .increment(1);
    histogram!("proxy_request_duration_seconds", "method" => method.to_string(), "status" => status)
        .record(start.elapsed().as_secs_f64());
}

/// Record the start of a relay in the given mode.
pub fn record_relay_session(mode: &'static str) {
    counter!("relay_sessions_total", "mode" => mode).increment(1);
}

/// Publish the number of relays currently running.
pub fn set_active_sessions(active: u64) {
    gauge!("relay_active_sessions").set(active as f64);
}

/// Record bytes moved by one finished direction.
pub fn record_relay_bytes(direction: &'static str, bytes: u64) {
    counter!("relay_bytes_total", "direction" => direction).increment(bytes);
}

/// Record a direction that ended with an error.
pub fn record_copy_error(direction: &'static str) {
    counter!("relay_copy_errors_total", "direction" => direction).increment(1);
}
