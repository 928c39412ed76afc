// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events emitted by the worker pool as jobs change state.

use courier_core::JobId;

use crate::job::FinishedJob;

/// A state change produced by processing one claimed job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// The gateway accepted the message.
    Completed(FinishedJob),
    /// The attempt failed and the job was rescheduled.
    Retrying {
        job_id: JobId,
        attempts: u32,
        delay_ms: u64,
        delay_until: i64,
        error: String,
    },
    /// The job failed permanently.
    Failed(FinishedJob),
    /// A stalled job was returned to waiting.
    Requeued { job_id: JobId },
    /// The attempt's outcome could not be written (stale claim or store
    /// error). Not published on the event channel.
    Dropped { job_id: JobId, reason: String },
}

impl JobEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            JobEvent::Completed(job) | JobEvent::Failed(job) => &job.id,
            JobEvent::Retrying { job_id, .. }
            | JobEvent::Requeued { job_id }
            | JobEvent::Dropped { job_id, .. } => job_id,
        }
    }

    /// The finished job, for terminal events.
    pub fn finished(&self) -> Option<&FinishedJob> {
        match self {
            JobEvent::Completed(job) | JobEvent::Failed(job) => Some(job),
            _ => None,
        }
    }

    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            JobEvent::Completed(_) => "completed",
            JobEvent::Retrying { .. } => "retrying",
            JobEvent::Failed(_) => "failed",
            JobEvent::Requeued { .. } => "requeued",
            JobEvent::Dropped { .. } => "dropped",
        }
    }
}
