// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messages API response types.

use serde::Deserialize;

/// Body of a successful `Messages.json` create call. Only the fields Courier
/// keeps are decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub sid: String,
    pub status: String,
    /// Decimal string, usually negative (a debit), or null until billed.
    #[serde(default)]
    pub price: Option<String>,
}

impl MessageResponse {
    /// Price as a positive amount, if the gateway reported one.
    pub fn cost(&self) -> Option<f64> {
        self.price
            .as_deref()
            .and_then(|p| p.trim().parse::<f64>().ok())
            .map(f64::abs)
    }
}

/// Error body returned alongside non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_is_reported_as_positive_cost() {
        let r: MessageResponse = serde_json::from_str(
            r#"{"sid":"SM1","status":"queued","price":"-0.00750","to":"+15551234567"}"#,
        )
        .unwrap();
        assert_eq!(r.cost(), Some(0.0075));
    }

    #[test]
    fn missing_or_null_price_has_no_cost() {
        let r: MessageResponse =
            serde_json::from_str(r#"{"sid":"SM1","status":"queued","price":null}"#).unwrap();
        assert_eq!(r.cost(), None);
        let r: MessageResponse = serde_json::from_str(r#"{"sid":"SM1","status":"sent"}"#).unwrap();
        assert_eq!(r.cost(), None);
    }
}
