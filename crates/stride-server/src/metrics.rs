//! Metrics collection and export for Stridewatch.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "stride_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "stride_connections_active";
    pub const SAMPLES_TOTAL: &str = "stride_samples_total";
    pub const BROADCASTS_TOTAL: &str = "stride_broadcasts_total";
    pub const FALLS_DETECTED_TOTAL: &str = "stride_falls_detected_total";
    pub const CADENCE_REQUESTS_TOTAL: &str = "stride_cadence_requests_total";
    pub const INGEST_LATENCY_SECONDS: &str = "stride_ingest_latency_seconds";
    pub const ERRORS_TOTAL: &str = "stride_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::SAMPLES_TOTAL, "Total number of samples ingested");
    metrics::describe_counter!(
        names::BROADCASTS_TOTAL,
        "Total number of samples re-broadcast to observers"
    );
    metrics::describe_counter!(names::FALLS_DETECTED_TOTAL, "Total number of falls detected");
    metrics::describe_counter!(
        names::CADENCE_REQUESTS_TOTAL,
        "Total number of cadence report requests"
    );
    metrics::describe_histogram!(
        names::INGEST_LATENCY_SECONDS,
        "Sample ingestion latency in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record an ingested sample.
pub fn record_sample(source: &str) {
    counter!(names::SAMPLES_TOTAL, "source" => source.to_string()).increment(1);
}

/// Record a re-broadcast and how many observers it reached.
pub fn record_broadcast(recipients: usize) {
    counter!(names::BROADCASTS_TOTAL).increment(recipients as u64);
}

/// Record a detected fall.
pub fn record_fall() {
    counter!(names::FALLS_DETECTED_TOTAL).increment(1);
}

/// Record a cadence request and its outcome.
pub fn record_cadence_request(outcome: &str) {
    counter!(names::CADENCE_REQUESTS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

/// Record sample ingestion latency.
pub fn record_ingest_latency(seconds: f64) {
    histogram!(names::INGEST_LATENCY_SECONDS).record(seconds);
}

/// Record an error.
pub fn record_error(error_type: &str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type.to_string()).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_guard() {
        // Just test that it doesn't panic
        let _guard = ConnectionMetricsGuard::new();
    }
}
