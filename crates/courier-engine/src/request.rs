// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and response values of the engine's public operations.

use courier_core::validation::{normalize_body, normalize_identifier, normalize_recipient};
use courier_core::{CourierError, HealthStatus, JobId};
use courier_queue::{EnqueueOptions, NewJob, QueueCounts};
use serde::{Deserialize, Serialize};

/// One message to send.
#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    pub recipient: String,
    pub body: String,
    /// Rate-limit key (tenant, API key, client address). Bulk items may
    /// leave it empty to inherit the batch identifier.
    #[serde(default)]
    pub identifier: String,
    /// Lower runs first; defaults to `queue.default_priority`.
    #[serde(default)]
    pub priority: Option<i64>,
    /// Hold the job back this long before it may be dispatched.
    #[serde(default)]
    pub delay_ms: Option<u64>,
    /// Opaque caller data stored with the job.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl SendRequest {
    pub fn new(
        recipient: impl Into<String>,
        body: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            body: body.into(),
            identifier: identifier.into(),
            priority: None,
            delay_ms: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Normalize and validate into a storable job.
    pub(crate) fn into_job(
        self,
        default_priority: i64,
        max_delay_ms: u64,
    ) -> Result<(NewJob, EnqueueOptions), CourierError> {
        let recipient = normalize_recipient(&self.recipient)?;
        let body = normalize_body(&self.body)?;
        let identifier = normalize_identifier(&self.identifier)?;
        let metadata = match self.metadata {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            serde_json::Value::Object(map) => serde_json::Value::Object(map),
            _ => {
                return Err(CourierError::Validation(
                    "metadata must be a JSON object".into(),
                ));
            }
        };
        let delay_ms = self.delay_ms.unwrap_or(0);
        if delay_ms > max_delay_ms {
            return Err(CourierError::Validation(format!(
                "delay_ms must not exceed {max_delay_ms}"
            )));
        }
        let options = EnqueueOptions {
            priority: self.priority.unwrap_or(default_priority),
            delay_ms,
        };
        Ok((
            NewJob {
                recipient,
                body,
                identifier,
                metadata,
            },
            options,
        ))
    }
}

/// Several messages submitted together.
///
/// `identifier` and `priority` apply to every item that does not set its own.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkRequest {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    pub messages: Vec<SendRequest>,
}

impl BulkRequest {
    pub fn new(messages: Vec<SendRequest>) -> Self {
        Self {
            identifier: None,
            priority: None,
            messages,
        }
    }

    /// Items with the batch defaults applied, in input order.
    pub(crate) fn into_items(self) -> Vec<SendRequest> {
        let BulkRequest {
            identifier,
            priority,
            messages,
        } = self;
        messages
            .into_iter()
            .map(|mut item| {
                if item.identifier.trim().is_empty()
                    && let Some(shared) = &identifier
                {
                    item.identifier = shared.clone();
                }
                item.priority = item.priority.or(priority);
                item
            })
            .collect()
    }
}

/// Result for one item of a bulk submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkItemResult {
    /// Position of the item in the request.
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkItemResult {
    pub fn is_accepted(&self) -> bool {
        self.job_id.is_some()
    }
}

/// Queue counts plus the pause flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    #[serde(flatten)]
    pub counts: QueueCounts,
    pub paused: bool,
}

/// Health of the engine's adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub storage: HealthStatus,
    pub dispatcher: HealthStatus,
}

impl HealthReport {
    /// Healthy only when storage is; a degraded dispatcher degrades.
    pub fn overall(&self) -> HealthStatus {
        match (&self.storage, &self.dispatcher) {
            (HealthStatus::Unhealthy(e), _) => HealthStatus::Unhealthy(e.clone()),
            (_, HealthStatus::Unhealthy(e)) | (_, HealthStatus::Degraded(e)) => {
                HealthStatus::Degraded(e.clone())
            }
            (HealthStatus::Degraded(e), _) => HealthStatus::Degraded(e.clone()),
            _ => HealthStatus::Healthy,
        }
    }
}
