//! Metrics and observability utilities
//!
//! Prometheus metrics for the HTTP surface, the two lifecycles and the
//! external collaborators.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all IntelliLib metrics
pub const METRICS_PREFIX: &str = "intellilib";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00,
];

/// Buckets for calls to the AI service, which are slower and bounded by its timeout
pub const AI_CALL_BUCKETS: &[f64] = &[0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.00, 30.00];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_documents_uploaded_total", METRICS_PREFIX),
        Unit::Count,
        "Documents uploaded, by uploader role"
    );

    describe_counter!(
        format!("{}_document_decisions_total", METRICS_PREFIX),
        Unit::Count,
        "Admin decisions on documents, by outcome"
    );

    describe_counter!(
        format!("{}_verification_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Verification request transitions, by target status"
    );

    describe_counter!(
        format!("{}_ai_fallbacks_total", METRICS_PREFIX),
        Unit::Count,
        "Requests served from the local fallback because the AI service failed"
    );

    describe_histogram!(
        format!("{}_ai_call_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "AI service call latency in seconds"
    );

    describe_counter!(
        format!("{}_notifications_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Notifications that could not be delivered"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

pub fn record_upload(role: &str) {
    counter!(
        format!("{}_documents_uploaded_total", METRICS_PREFIX),
        "role" => role.to_string()
    )
    .increment(1);
}

pub fn record_document_decision(outcome: &str) {
    counter!(
        format!("{}_document_decisions_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_verification_transition(status: &str) {
    counter!(
        format!("{}_verification_transitions_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_ai_fallback(operation: &str) {
    counter!(
        format!("{}_ai_fallbacks_total", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Helper to record an AI service call
pub fn record_ai_call(duration_secs: f64, operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    histogram!(
        format!("{}_ai_call_duration_seconds", METRICS_PREFIX),
        "operation" => operation.to_string(),
        "status" => status
    )
    .record(duration_secs);
}

pub fn record_notification_failure(kind: &str) {
    counter!(
        format!("{}_notifications_failed_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_are_sorted() {
        for buckets in [LATENCY_BUCKETS, AI_CALL_BUCKETS] {
            assert!(buckets.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        let metrics = RequestMetrics::start("GET", "/api/documents/articles");
        metrics.finish(200);
        record_upload("student");
        record_ai_call(0.2, "semantic_search", false);
        // No recorder installed: calls are no-ops
    }
}
