// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier SMS dispatch engine.
//!
//! Provides the shared error type, adapter traits, the injectable clock, and
//! request validation used by every other crate in the workspace.

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;
pub mod validation;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CourierError;
pub use traits::{DispatchAdapter, PluginAdapter};
pub use types::{AdapterType, DispatchReceipt, HealthStatus, JobId, Outcome};
