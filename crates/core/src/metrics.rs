//! Prometheus metrics for the background components.
//!
//! This module provides metrics for:
//! - Scheduler (operations fired/failed)
//! - RSS monitor (feed checks, items submitted)
//! - Automation (rule evaluations)
//! - Statistics (completions recorded, registered torrents)

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Registry holding every metric in this module.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        if let Err(e) = registry.register(metric) {
            tracing::warn!(error = %e, "Failed to register metric");
        }
    }
    registry
});

// =============================================================================
// Scheduler
// =============================================================================

/// Scheduled operations by result.
pub static SCHEDULE_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tamer_schedule_runs_total", "Scheduled operations executed"),
        &["result"], // "fired", "failed"
    )
    .expect("valid metric definition")
});

// =============================================================================
// RSS
// =============================================================================

/// Feed checks by result.
pub static FEED_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tamer_feed_checks_total", "RSS feed checks"),
        &["result"], // "ok", "failed"
    )
    .expect("valid metric definition")
});

/// Feed items handed to the registry.
pub static FEED_ITEMS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tamer_feed_items_submitted_total",
            "RSS items submitted for download",
        ),
        &["result"], // "added", "duplicate", "failed"
    )
    .expect("valid metric definition")
});

// =============================================================================
// Automation
// =============================================================================

/// Rule evaluations by outcome.
pub static RULE_EVALUATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tamer_rule_evaluations_total", "Automation rule evaluations"),
        &["outcome"], // "fired", "skipped", "failed"
    )
    .expect("valid metric definition")
});

// =============================================================================
// Statistics
// =============================================================================

/// Completed torrents appended to the history.
pub static COMPLETIONS_RECORDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tamer_completions_recorded_total",
        "Torrents recorded as completed",
    )
    .expect("valid metric definition")
});

/// Torrents in the registry at the last stats update.
pub static TORRENTS_REGISTERED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("tamer_torrents_registered", "Torrents currently registered")
        .expect("valid metric definition")
});

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(SCHEDULE_RUNS.clone()),
        Box::new(FEED_CHECKS.clone()),
        Box::new(FEED_ITEMS_SUBMITTED.clone()),
        Box::new(RULE_EVALUATIONS.clone()),
        Box::new(COMPLETIONS_RECORDED.clone()),
        Box::new(TORRENTS_REGISTERED.clone()),
    ]
}

/// Encode all metrics as Prometheus text format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
