//! Prometheus metrics for indexer operations.
//!
//! This module provides metrics for:
//! - Searches (outcome, duration, rows processed)
//! - Extraction warnings per field
//! - Logins

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// =============================================================================
// Search Metrics
// =============================================================================

/// Searches total by site and result.
pub static SEARCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trawler_searches_total", "Total searches run against indexers"),
        &["site", "result"], // "success", "empty", "failed"
    )
    .unwrap()
});

/// Search duration in seconds.
pub static SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "trawler_search_duration_seconds",
            "Duration of a search including navigation and extraction",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["site"],
    )
    .unwrap()
});

/// Result rows by outcome.
pub static ROWS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trawler_rows_total", "Result rows processed"),
        &["site", "outcome"], // "emitted", "filtered"
    )
    .unwrap()
});

/// Malformed optional field values that were skipped.
pub static EXTRACTION_WARNINGS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trawler_extraction_warnings_total",
            "Field values that could not be coerced and were skipped",
        ),
        &["site", "field"],
    )
    .unwrap()
});

// =============================================================================
// Login Metrics
// =============================================================================

/// Logins total by site and result.
pub static LOGINS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trawler_logins_total", "Total login attempts"),
        &["site", "result"], // "success", "rejected", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(SEARCHES_TOTAL.clone()),
        Box::new(SEARCH_DURATION.clone()),
        Box::new(ROWS_TOTAL.clone()),
        Box::new(EXTRACTION_WARNINGS.clone()),
        Box::new(LOGINS_TOTAL.clone()),
    ]
}

/// Register every metric with `registry`.
pub fn register_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}
