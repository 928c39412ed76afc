// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job records and the values passed in and out of the job store.

use courier_core::{DispatchReceipt, JobId, Outcome};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle state of a job.
///
/// `Delayed` is a sub-state of waiting used for backoff and scheduled sends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl JobState {
    /// The state shown to callers: a delayed job whose delay has elapsed is
    /// indistinguishable from a waiting one.
    pub fn reported(self, delay_until: i64, now: i64) -> JobState {
        match self {
            JobState::Delayed if delay_until <= now => JobState::Waiting,
            other => other,
        }
    }
}

/// A validated send request ready to be stored.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub recipient: String,
    pub body: String,
    pub identifier: String,
    pub metadata: serde_json::Value,
}

/// Scheduling options for [`crate::JobStore::enqueue`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnqueueOptions {
    /// Lower runs first.
    pub priority: i64,
    /// Milliseconds to wait before the job becomes eligible.
    pub delay_ms: u64,
}

/// Result of a successful enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enqueued {
    pub job_id: JobId,
    /// 1-based rank among unclaimed jobs in dispatch order.
    pub position: u64,
}

/// Read-only view of a job for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub state: JobState,
    pub recipient: String,
    pub body: String,
    pub identifier: String,
    pub priority: i64,
    pub metadata: serde_json::Value,
    pub attempts: u32,
    pub max_attempts: u32,
    pub delay_until: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub finished_at: Option<i64>,
    pub receipt: Option<DispatchReceipt>,
    pub error: Option<String>,
}

/// A job claimed by a worker. The `lease` identifies this particular claim.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: JobId,
    pub recipient: String,
    pub body: String,
    pub identifier: String,
    pub metadata: serde_json::Value,
    pub priority: i64,
    /// Attempts started so far, including this one.
    pub attempts: u32,
    pub max_attempts: u32,
    pub lease: i64,
    pub created_at: i64,
}

impl ClaimedJob {
    /// Summary of this job after a terminal transition at `finished_at`.
    pub fn finish(
        &self,
        finished_at: i64,
        outcome: Outcome,
        receipt: Option<DispatchReceipt>,
        error: Option<String>,
    ) -> FinishedJob {
        FinishedJob {
            id: self.id.clone(),
            recipient: self.recipient.clone(),
            body: self.body.clone(),
            identifier: self.identifier.clone(),
            attempts: self.attempts,
            created_at: self.created_at,
            finished_at,
            outcome,
            receipt,
            error,
        }
    }
}

/// Everything the outcome recorder needs about a job that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinishedJob {
    pub id: JobId,
    pub recipient: String,
    pub body: String,
    pub identifier: String,
    pub attempts: u32,
    pub created_at: i64,
    pub finished_at: i64,
    pub outcome: Outcome,
    pub receipt: Option<DispatchReceipt>,
    pub error: Option<String>,
}

impl FinishedJob {
    /// Time from enqueue to terminal state.
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.created_at).max(0)
    }
}

/// Number of jobs per reported state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub waiting: u64,
    pub delayed: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Whether a compare-and-set transition on a claimed job took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Applied at the given epoch millis.
    Applied { at: i64 },
    /// The claim no longer holds (the job was recovered or reclaimed).
    Stale,
}

/// What stalled-job recovery did with one job.
#[derive(Debug, Clone, PartialEq)]
pub enum StallRecovery {
    /// Returned to waiting for another attempt.
    Requeued(JobId),
    /// Stalled a second time and was failed.
    Failed(FinishedJob),
}
