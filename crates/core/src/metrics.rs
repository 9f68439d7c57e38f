//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Plot jobs (running count, phase distribution)
//! - Archive scheduling (transfers in flight, tick outcomes)
//! - The scheduler tick itself

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts};

// =============================================================================
// Job Metrics
// =============================================================================

/// Plot jobs currently running.
pub static JOBS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("plotherd_jobs_running", "Plot jobs currently running").unwrap()
});

/// Plot jobs by major phase.
pub static JOBS_BY_PHASE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("plotherd_jobs_by_phase", "Plot jobs by major phase"),
        &["phase"], // "0".."4", "unknown"
    )
    .unwrap()
});

// =============================================================================
// Archive Metrics
// =============================================================================

/// Archive transfers in flight, placeholders included.
pub static TRANSFERS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "plotherd_archive_transfers_running",
        "Archive transfers in flight",
    )
    .unwrap()
});

/// Archive tick outcomes.
pub static ARCHIVE_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("plotherd_archive_outcomes_total", "Archive tick outcomes"),
        &["outcome"], // "launched", "skipped", or a refusal reason
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Scheduler tick duration in seconds.
pub static TICK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "plotherd_tick_duration_seconds",
            "Duration of scheduler ticks",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["result"], // "success", "error"
    )
    .unwrap()
});

/// Scheduler tick errors.
pub static TICK_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("plotherd_tick_errors_total", "Total failed scheduler ticks").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Jobs
        Box::new(JOBS_RUNNING.clone()),
        Box::new(JOBS_BY_PHASE.clone()),
        // Archive
        Box::new(TRANSFERS_RUNNING.clone()),
        Box::new(ARCHIVE_OUTCOMES.clone()),
        // Scheduler
        Box::new(TICK_DURATION.clone()),
        Box::new(TICK_ERRORS.clone()),
    ]
}
