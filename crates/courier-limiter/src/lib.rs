// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission control for the Courier dispatch engine.
//!
//! A per-identifier sliding window over admitted-request timestamps, with a
//! fixed-duration hard block once the window overflows. Decisions are made
//! against the shared SQLite store so every process sharing the database
//! sees the same limits.

pub mod controller;
pub mod decision;

pub use controller::AdmissionController;
pub use decision::Decision;
