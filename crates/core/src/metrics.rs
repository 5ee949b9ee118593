//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - slskd calls (requests by outcome, retries)
//! - The search pipeline (outcomes, cache effectiveness)
//! - Download jobs registered through the SABnzbd emulation

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

// =============================================================================
// Upstream (slskd)
// =============================================================================

/// slskd requests by operation and result.
pub static SLSKD_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("soulbridge_slskd_requests_total", "Total slskd API requests"),
        &["operation", "result"], // result: "success", "failure"
    )
    .unwrap()
});

/// Retries issued by the resilience layer.
pub static UPSTREAM_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "soulbridge_upstream_retries_total",
            "Upstream calls retried after a transient failure",
        ),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Search
// =============================================================================

/// Searches by outcome.
pub static SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("soulbridge_searches_total", "Peer network searches run"),
        &["outcome"], // "completed", "timed_out", "failed"
    )
    .unwrap()
});

/// Search cache lookups.
pub static SEARCH_CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "soulbridge_search_cache_lookups_total",
            "Search result cache lookups",
        ),
        &["result"], // "hit", "miss"
    )
    .unwrap()
});

// =============================================================================
// Downloads
// =============================================================================

/// Jobs registered via addfile.
pub static JOBS_REGISTERED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "soulbridge_jobs_registered_total",
        "Download jobs registered through the SABnzbd API",
    )
    .unwrap()
});

/// All core metrics, for registration in the server's registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(SLSKD_REQUESTS.clone()),
        Box::new(UPSTREAM_RETRIES.clone()),
        Box::new(SEARCHES.clone()),
        Box::new(SEARCH_CACHE_LOOKUPS.clone()),
        Box::new(JOBS_REGISTERED.clone()),
    ]
}
