//! Prometheus metrics for bet-reconciliation-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Matching passes by outcome.
pub static MATCHING_PASSES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bet_reconciliation_matching_passes_total",
        "Total number of matching passes",
        &["status"]
    )
    .expect("Failed to register MATCHING_PASSES")
});

/// Matched events committed, by the threshold that accepted them.
pub static MATCHED_EVENTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bet_reconciliation_matched_events_total",
        "Total number of matched events created",
        &["threshold"]
    )
    .expect("Failed to register MATCHED_EVENTS")
});

/// Records moved to the excluded state, by source.
pub static EXCLUSIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bet_reconciliation_exclusions_total",
        "Total number of records excluded from matching",
        &["source"]
    )
    .expect("Failed to register EXCLUSIONS")
});

/// Qualifying candidates that were not committed, by reason.
pub static REJECTED_CANDIDATES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bet_reconciliation_rejected_candidates_total",
        "Total number of qualifying candidates rejected before commit",
        &["reason"]
    )
    .expect("Failed to register REJECTED_CANDIDATES")
});

/// Histogram for store operation duration.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "bet_reconciliation_db_query_duration_seconds",
        "Document store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bet_reconciliation_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&MATCHING_PASSES);
    Lazy::force(&MATCHED_EVENTS);
    Lazy::force(&EXCLUSIONS);
    Lazy::force(&REJECTED_CANDIDATES);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_matching_pass(status: &str) {
    MATCHING_PASSES.with_label_values(&[status]).inc();
}

pub fn record_matched_event(threshold: f64) {
    MATCHED_EVENTS
        .with_label_values(&[threshold.to_string().as_str()])
        .inc();
}

pub fn record_exclusion(source: &str) {
    EXCLUSIONS.with_label_values(&[source]).inc();
}

pub fn record_rejected_candidate(reason: &str) {
    REJECTED_CANDIDATES.with_label_values(&[reason]).inc();
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
