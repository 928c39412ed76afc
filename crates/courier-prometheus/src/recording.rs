// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder can collect these metrics.
//! Hot-path counters are emitted where the events happen (limiter, job
//! store, worker pool); the gauges below are refreshed by the engine.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Courier metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "courier_admissions_total",
        "Admission decisions by outcome (allowed, blocked, rejected)"
    );
    describe_counter!(
        "courier_admission_fail_open_total",
        "Requests admitted because the rate limit store was unavailable"
    );
    describe_counter!("courier_jobs_enqueued_total", "Jobs accepted into the queue");
    describe_counter!(
        "courier_jobs_finished_total",
        "Jobs that reached a terminal state, by outcome"
    );
    describe_counter!("courier_jobs_retried_total", "Failed attempts scheduled for retry");
    describe_counter!(
        "courier_jobs_stalled_total",
        "Stalled jobs recovered, by action (requeued, failed)"
    );
    describe_histogram!(
        "courier_dispatch_latency_seconds",
        "Time spent in a single gateway send"
    );
    describe_gauge!("courier_queue_depth", "Jobs per queue state");
    describe_gauge!("courier_queue_paused", "1 when the queue is paused");
}

/// Set the number of jobs in one queue state.
pub fn set_queue_depth(state: &'static str, depth: u64) {
    metrics::gauge!("courier_queue_depth", "state" => state).set(depth as f64);
}

/// Set the paused flag.
pub fn set_queue_paused(paused: bool) {
    metrics::gauge!("courier_queue_paused").set(if paused { 1.0 } else { 0.0 });
}
