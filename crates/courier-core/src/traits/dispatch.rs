// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound SMS gateway adapter trait.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::DispatchReceipt;

/// Sends a single message through an SMS gateway.
///
/// Callers pass recipients and bodies that have already been normalized by
/// [`crate::validation`]. Implementations report gateway and transport
/// failures as [`CourierError::Dispatch`]; anything they classify as a
/// permanent input problem should be a [`CourierError::Validation`].
#[async_trait]
pub trait DispatchAdapter: PluginAdapter {
    async fn send(&self, recipient: &str, body: &str) -> Result<DispatchReceipt, CourierError>;
}
