// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable SMS job queue for Courier.
//!
//! - [`JobStore`]: SQLite-backed jobs with priority ordering, delays, and
//!   lease-checked state transitions.
//! - [`RetryPolicy`]: exponential backoff between attempts.
//! - [`WorkerPool`]: bounded-concurrency dispatch loop with pause/resume and
//!   stalled-job recovery.

pub mod events;
pub mod job;
pub mod pool;
pub mod retry;
pub mod store;

pub use events::JobEvent;
pub use job::{
    ClaimedJob, EnqueueOptions, Enqueued, FinishedJob, JobState, JobView, NewJob, QueueCounts,
    StallRecovery, Transition,
};
pub use pool::{PoolConfig, WorkerPool};
pub use retry::{RetryDecision, RetryPolicy};
pub use store::{JobStore, STALLED_ERROR};
