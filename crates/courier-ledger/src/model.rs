// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rows returned by ledger queries.

use courier_core::{DispatchReceipt, JobId, Outcome};
use serde::Serialize;

/// One delivery log row. The recipient is masked and the body truncated
/// before anything is written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryLogEntry {
    pub id: i64,
    pub job_id: JobId,
    /// RFC 3339 time the job reached its terminal state.
    pub timestamp: String,
    pub recorded_at: i64,
    pub recipient: String,
    pub preview: String,
    pub outcome: Outcome,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<DispatchReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome counters for one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStats {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Sum of enqueue-to-finish times across all jobs of the day.
    pub total_duration_ms: i64,
    /// Sum of gateway-reported costs.
    pub total_cost: f64,
}

impl DailyStats {
    pub fn empty(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            total: 0,
            successful: 0,
            failed: 0,
            total_duration_ms: 0,
            total_cost: 0.0,
        }
    }

    /// Mean processing time, if anything finished that day.
    pub fn avg_duration_ms(&self) -> Option<f64> {
        (self.total > 0).then(|| self.total_duration_ms as f64 / self.total as f64)
    }

    pub(crate) fn add(&mut self, outcome: Outcome, count: u64, duration_ms: i64, cost: f64) {
        match outcome {
            Outcome::Success => self.successful += count,
            Outcome::Failure => self.failed += count,
        }
        self.total += count;
        self.total_duration_ms += duration_ms;
        self.total_cost += cost;
    }
}
