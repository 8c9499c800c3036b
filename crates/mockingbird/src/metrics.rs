//! Prometheus metrics for mockingbird.
//!
//! Tracks resolution outcomes, matcher failures and record mode activity.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};

lazy_static! {
    /// Requests handled, by resolution outcome
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mockingbird_requests_total",
        "Total number of requests handled",
        &["method", "outcome"]  // outcome: matched|unmatched|proxied|proxy_error
    )
    .unwrap();

    /// Mappings excluded because a matcher failed
    pub static ref MATCHER_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "mockingbird_matcher_errors_total",
        "Total number of mapping evaluations excluded due to matcher failures",
        &["kind"]  // kind: matcher_error|panic
    )
    .unwrap();

    /// Mappings synthesized in record mode
    pub static ref RECORDED_MAPPINGS_TOTAL: IntCounter = register_int_counter!(
        "mockingbird_recorded_mappings_total",
        "Total number of mappings recorded from proxied exchanges"
    )
    .unwrap();

    /// Currently registered mappings
    pub static ref REGISTERED_MAPPINGS: IntGauge = register_int_gauge!(
        "mockingbird_registered_mappings",
        "Number of mappings currently registered"
    )
    .unwrap();

    /// Time spent resolving a request to a mapping
    pub static ref RESOLUTION_DURATION_US: HistogramVec = register_histogram_vec!(
        "mockingbird_resolution_duration_us",
        "Histogram of mapping resolution time in microseconds",
        &["outcome"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper to record a handled request
pub fn record_request(method: &str, outcome: &str) {
    REQUESTS_TOTAL.with_label_values(&[method, outcome]).inc();
}

/// Helper to record a matcher failure
pub fn record_matcher_error(kind: &str) {
    MATCHER_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_recorded_mapping() {
    RECORDED_MAPPINGS_TOTAL.inc();
}

/// Helper to record resolution time
pub fn record_resolution(outcome: &str, duration_us: f64) {
    RESOLUTION_DURATION_US
        .with_label_values(&[outcome])
        .observe(duration_us);
}
