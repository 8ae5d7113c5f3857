//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_active_sessions` (gauge): open sessions by kind
//! - `relay_sessions_total` (counter): sessions opened by kind
//! - `relay_messages_total` (counter): relayed messages by direction
//! - `relay_decode_failures_total` (counter): envelopes that failed to decode
//! - `relay_artifacts_total` (counter): artifacts written by kind
//! - `front_requests_total` (counter): forwarded requests by status
//! - `front_request_duration_seconds` (histogram): forwarded request latency
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::net::SessionKind;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_session_opened(kind: SessionKind) {
    metrics::counter!("relay_sessions_total", "kind" => kind.as_str()).increment(1);
    metrics::gauge!("relay_active_sessions", "kind" => kind.as_str()).increment(1.0);
}

pub fn record_session_closed(kind: SessionKind) {
    metrics::gauge!("relay_active_sessions", "kind" => kind.as_str()).decrement(1.0);
}

pub fn record_message(direction: &'static str) {
    metrics::counter!("relay_messages_total", "direction" => direction).increment(1);
}

pub fn record_decode_failure() {
    metrics::counter!("relay_decode_failures_total").increment(1);
}

pub fn record_artifact(kind: &'static str) {
    metrics::counter!("relay_artifacts_total", "kind" => kind).increment(1);
}

/// Record a forwarded request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let duration = start.elapsed().as_secs_f64();
    let status = status.to_string();
    metrics::counter!(
        "front_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "front_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(duration);
}
