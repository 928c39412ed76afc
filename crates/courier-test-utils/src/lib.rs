// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without a real SMS gateway.
//!
//! # Components
//!
//! - [`MockDispatcher`] - Mock gateway with scripted results and concurrency tracking
//! - [`TestHarness`] - Full engine on an in-memory database and a manual clock

pub mod harness;
pub mod mock_dispatcher;

pub use courier_core::ManualClock;
pub use harness::{DEFAULT_START_MS, TestHarness, TestHarnessBuilder};
pub use mock_dispatcher::{MockDispatcher, MockResult, SentMessage};
