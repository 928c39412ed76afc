// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier engine: the admission controller, job queue, worker pool, and
//! outcome recorder assembled behind one facade.
//!
//! ```text
//! submit -> validate -> AdmissionController::evaluate -> JobStore::enqueue
//!                                                          |
//!          OutcomeRecorder <- JobEvent channel <- WorkerPool (claim, send, retry)
//! ```

pub mod courier;
pub mod request;
pub mod runtime;

pub use courier::Courier;
pub use request::{BulkItemResult, BulkRequest, HealthReport, QueueStats, SendRequest};
pub use runtime::{EngineHandle, MAINTENANCE_INTERVAL};
