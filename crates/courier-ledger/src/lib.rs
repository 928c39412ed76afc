// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery log and daily statistics for finished Courier jobs.

pub mod model;
pub mod recorder;

pub use model::{DailyStats, DeliveryLogEntry};
pub use recorder::OutcomeRecorder;
