//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the soulbridge server:
//! - HTTP request metrics (latency, counts, auth failures)
//! - Tracked download jobs and cached search results (collected on scrape)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "soulbridge_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 20.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("soulbridge_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "soulbridge_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "soulbridge_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// State gauges (collected dynamically)
// =============================================================================

/// Download jobs known to the tracker.
pub static TRACKED_DOWNLOADS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "soulbridge_tracked_downloads",
        "Download jobs currently tracked",
    )
    .unwrap()
});

/// Search results downloadable by guid.
pub static CACHED_RESULTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "soulbridge_cached_results",
        "Grouped search results held for NZB download",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    // State
    registry
        .register(Box::new(TRACKED_DOWNLOADS.clone()))
        .unwrap();
    registry.register(Box::new(CACHED_RESULTS.clone())).unwrap();

    // Core metrics (slskd, search, jobs)
    for metric in soulbridge_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh gauges from current application state before a scrape.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    TRACKED_DOWNLOADS.set(state.tracker().len().await as i64);
    CACHED_RESULTS.set(state.search().cached_results().await as i64);
}

static GUID_REGEX: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"/[0-9a-f]{16}-[0-9a-f]+(/|$)").unwrap());

/// Normalize a path for metric labels (replace result guids with a placeholder).
pub fn normalize_path(path: &str) -> String {
    GUID_REGEX.replace_all(path, "/{guid}$1").to_string()
}
