//! Metrics and telemetry for the administration façade
//!
//! Prometheus metrics for statement orchestration, telemetry fetches and
//! adapter retries. Exposed by the server at `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // === Statement Orchestration ===

    /// Statements by final outcome
    pub static ref STATEMENTS_TOTAL: CounterVec = register_counter_vec!(
        "warehouse_admin_statements_total",
        "Statements orchestrated, by outcome",
        &["outcome"]
    ).unwrap();

    /// Status checks needed per statement
    pub static ref POLL_ITERATIONS: Histogram = register_histogram!(
        "warehouse_admin_poll_iterations",
        "Status checks issued before a statement reached a terminal state",
        vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0]
    ).unwrap();

    /// End-to-end statement latency
    pub static ref EXECUTION_DURATION: HistogramVec = register_histogram_vec!(
        "warehouse_admin_execution_duration_seconds",
        "Submit-to-result latency in seconds",
        &["outcome"],
        vec![0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]
    ).unwrap();

    /// Result pages fetched per statement
    pub static ref RESULT_PAGES: Histogram = register_histogram!(
        "warehouse_admin_result_pages",
        "Result pages fetched per materialized statement",
        vec![1.0, 2.0, 5.0, 10.0, 50.0, 100.0]
    ).unwrap();

    // === Telemetry ===

    /// Telemetry queries by metric and outcome
    pub static ref METRICS_FETCHES_TOTAL: CounterVec = register_counter_vec!(
        "warehouse_admin_metrics_fetches_total",
        "Telemetry datapoint queries, by metric and outcome",
        &["metric", "outcome"]
    ).unwrap();

    // === Adapters ===

    /// Transport-level retries by service
    pub static ref ADAPTER_RETRIES_TOTAL: CounterVec = register_counter_vec!(
        "warehouse_admin_adapter_retries_total",
        "Retried requests to external services",
        &["service"]
    ).unwrap();
}

/// Record the end of one orchestration
#[inline]
pub fn record_statement(outcome: &str, elapsed_secs: f64, polls: u32) {
    STATEMENTS_TOTAL.with_label_values(&[outcome]).inc();
    EXECUTION_DURATION
        .with_label_values(&[outcome])
        .observe(elapsed_secs);
    POLL_ITERATIONS.observe(polls as f64);
}

/// Record one telemetry query
#[inline]
pub fn record_metrics_fetch(metric: &str, success: bool) {
    let outcome = if success { "success" } else { "error" };
    METRICS_FETCHES_TOTAL
        .with_label_values(&[metric, outcome])
        .inc();
}

/// Render all registered metrics in the Prometheus text format
///
/// # Returns
///
/// Result containing the formatted metrics string, or an error if encoding fails
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}
