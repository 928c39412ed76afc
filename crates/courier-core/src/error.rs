// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier dispatch engine.

use thiserror::Error;

/// The primary error type used across all Courier adapter traits and core operations.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Malformed recipient, empty or oversized body, bad input format.
    #[error("validation error: {0}")]
    Validation(String),

    /// The caller's identifier is over its admission limit or blocked.
    #[error("rate limit exceeded for `{identifier}`, retry after {retry_after_ms}ms")]
    RateLimited {
        identifier: String,
        /// Epoch millis at which the oldest request in the window expires.
        reset_at: i64,
        retry_after_ms: i64,
    },

    /// Gateway or transport failure while sending a message.
    #[error("dispatch error: {message}")]
    Dispatch {
        message: String,
        /// HTTP status returned by the gateway, if the request got that far.
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Whether a failed send attempt with this error may be retried.
    ///
    /// Validation failures and admission rejections cannot change outcome on
    /// a later attempt. Everything else is treated as transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            CourierError::Validation(_) | CourierError::RateLimited { .. }
        )
    }

    /// Wrap any error as a storage failure.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        CourierError::Storage {
            source: source.into(),
        }
    }

    /// Build a dispatch error without an underlying source.
    pub fn dispatch(message: impl Into<String>, status: Option<u16>) -> Self {
        CourierError::Dispatch {
            message: message.into(),
            status,
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_rate_limit_are_not_retryable() {
        assert!(!CourierError::Validation("empty body".into()).is_retryable());
        assert!(
            !CourierError::RateLimited {
                identifier: "tenant-a".into(),
                reset_at: 10,
                retry_after_ms: 5,
            }
            .is_retryable()
        );
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(CourierError::dispatch("gateway 503", Some(503)).is_retryable());
        assert!(CourierError::storage("disk gone").is_retryable());
        assert!(
            CourierError::Timeout {
                duration: std::time::Duration::from_secs(30)
            }
            .is_retryable()
        );
        assert!(CourierError::Internal("boom".into()).is_retryable());
    }

    #[test]
    fn rate_limited_message_includes_identifier() {
        let err = CourierError::RateLimited {
            identifier: "tenant-a".into(),
            reset_at: 1_000,
            retry_after_ms: 250,
        };
        let msg = err.to_string();
        assert!(msg.contains("tenant-a"));
        assert!(msg.contains("250ms"));
    }
}
