// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Courier dispatch engine.
//!
//! Owns the connection lifecycle and the schema. The job store, admission
//! controller, and outcome recorder each issue their own queries through
//! [`Database::connection`] against the tables they own.

pub mod database;
mod migrations;

pub use database::{Database, map_tr_err};
