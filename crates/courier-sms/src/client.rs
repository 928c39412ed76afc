// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for a Twilio-compatible Messages API.
//!
//! Messages are created with a form POST to
//! `{base_url}/2010-04-01/Accounts/{account_sid}/Messages.json` using HTTP
//! basic auth. The client never retries on its own; the worker pool's
//! backoff decides whether a failed send is attempted again.

use std::time::Duration;

use courier_config::model::SmsConfig;
use courier_core::{CourierError, DispatchReceipt};
use tracing::debug;

use crate::types::{ApiErrorResponse, MessageResponse};

/// Sends messages and probes the account on the gateway.
#[derive(Debug, Clone)]
pub struct SmsClient {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl SmsClient {
    /// Build a client from the `sms` config section.
    ///
    /// Fails with a configuration error when credentials or the sender
    /// number are missing.
    pub fn new(config: &SmsConfig) -> Result<Self, CourierError> {
        let account_sid = required(&config.account_sid, "sms.account_sid")?;
        let auth_token = required(&config.auth_token, "sms.auth_token")?;
        let from_number = required(&config.from_number, "sms.from_number")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CourierError::Dispatch {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            from_number,
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn account_sid(&self) -> &str {
        &self.account_sid
    }

    fn account_url(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}", self.base_url, self.account_sid)
    }

    /// Create one outbound message.
    ///
    /// 400 and 422 mean the gateway rejected the message content and are
    /// returned as [`CourierError::Validation`]. Every other failure status,
    /// and any transport failure, is a retryable [`CourierError::Dispatch`].
    pub async fn send_message(&self, to: &str, body: &str) -> Result<DispatchReceipt, CourierError> {
        let url = format!("{}/Messages.json", self.account_url());
        let params = [("To", to), ("From", self.from_number.as_str()), ("Body", body)];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| CourierError::Dispatch {
                message: format!("HTTP request failed: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, "messages API response received");

        let text = response.text().await.map_err(|e| CourierError::Dispatch {
            message: format!("failed to read response body: {e}"),
            status: Some(status.as_u16()),
            source: Some(Box::new(e)),
        })?;

        if status.is_success() {
            let message: MessageResponse =
                serde_json::from_str(&text).map_err(|e| CourierError::Dispatch {
                    message: format!("failed to parse messages API response: {e}"),
                    status: Some(status.as_u16()),
                    source: Some(Box::new(e)),
                })?;
            let cost = message.cost();
            return Ok(DispatchReceipt {
                message_id: message.sid,
                status: message.status,
                cost,
            });
        }

        let detail = match serde_json::from_str::<ApiErrorResponse>(&text) {
            Ok(api) => match api.code {
                Some(code) => format!("{} (code {code})", api.message),
                None => api.message,
            },
            Err(_) => text,
        };
        let message = format!("gateway returned {status}: {detail}");

        if is_input_rejection(status) {
            Err(CourierError::Validation(message))
        } else {
            Err(CourierError::dispatch(message, Some(status.as_u16())))
        }
    }

    /// Fetch the account resource to confirm credentials and reachability.
    pub async fn probe(&self) -> Result<(), CourierError> {
        let url = format!("{}.json", self.account_url());
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| CourierError::Dispatch {
                message: format!("HTTP request failed: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(CourierError::dispatch(
                format!("account probe returned {status}"),
                Some(status.as_u16()),
            ))
        }
    }
}

fn required(value: &Option<String>, key: &str) -> Result<String, CourierError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(CourierError::Config(format!("{key} is required"))),
    }
}

/// Returns true for HTTP status codes where a later attempt may succeed.
/// The provider refused the message itself (bad number, empty body).
/// Every other failure status is worth another attempt.
fn is_input_rejection(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 400 | 422)
}
