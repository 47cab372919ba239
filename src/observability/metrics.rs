//! Metrics collection and exposition.
//!
//! # Metrics
//! - `uwsgi_requests_total` (counter): proxied requests by method, status, backend
//! - `uwsgi_request_duration_seconds` (histogram): exchange + relay-start latency
//! - `uwsgi_backend_errors_total` (counter): failed exchanges by backend, kind
//! - `uwsgi_passthrough_total` (counter): requests handed to the next handler

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    metrics::counter!(
        "uwsgi_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "uwsgi_request_duration_seconds",
        "method" => method.to_string(),
        "backend" => backend.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_backend_error(backend: &str, kind: &'static str) {
    metrics::counter!(
        "uwsgi_backend_errors_total",
        "backend" => backend.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_passthrough() {
    metrics::counter!("uwsgi_passthrough_total").increment(1);
}
