//! Store metrics collection.
//!
//! - Request counters by operation and status
//! - Latency histograms
//! - Retry counters

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total store requests by operation, backend and status.
    pub const REQUESTS_TOTAL: &str = "docgate_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "docgate_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "docgate_latency_seconds";
}

/// Record metrics for a completed store request.
pub fn record_request(operation: &str, backend: &'static str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "backend" => backend,
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string(),
        "backend" => backend
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.starts_with("docgate_"));
        assert!(names::RETRIES_TOTAL.contains("retries"));
        assert!(names::LATENCY_SECONDS.ends_with("_seconds"));
    }
}
