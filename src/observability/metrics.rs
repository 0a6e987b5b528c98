//! Self-metrics of the monitor.
//!
//! # Metrics
//! - `clockwork_requests_captured_total` (counter)
//! - `clockwork_requests_finalized_total` (counter): by status class
//! - `clockwork_request_duration_ms` (histogram)
//! - `clockwork_store_evictions_total` (counter)
//! - `clockwork_in_flight_requests` (gauge)
//! - `clockwork_in_flight_swept_total` (counter): abandoned requests dropped
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder the
//!   calls are no-ops
//! - Prometheus exposition is opt-in via `init_metrics`

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_captured() {
    metrics::counter!("clockwork_requests_captured_total").increment(1);
}

pub fn record_finalized(status_class: &'static str, duration_ms: f64) {
    metrics::counter!("clockwork_requests_finalized_total", "status_class" => status_class).increment(1);
    metrics::histogram!("clockwork_request_duration_ms").record(duration_ms);
}

pub fn record_eviction() {
    metrics::counter!("clockwork_store_evictions_total").increment(1);
}

pub fn record_in_flight(count: usize) {
    metrics::gauge!("clockwork_in_flight_requests").set(count as f64);
}

pub fn record_swept(count: usize) {
    metrics::counter!("clockwork_in_flight_swept_total").increment(count as u64);
}
