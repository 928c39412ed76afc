// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Courier engine.
//!
//! Exposes job submission, job and queue inspection, the delivery log,
//! daily statistics, and rate-limit administration as a JSON API, plus
//! unauthenticated `/health` and `/metrics` endpoints.

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{GatewayState, router, serve};
