// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The result of an admission check.

use serde::Serialize;

/// Outcome of evaluating (or inspecting) an identifier's rate-limit window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the request is (or would be) admitted.
    pub allowed: bool,
    /// Requests still available in the current window.
    pub remaining: u32,
    /// Epoch millis at which the oldest event in the window expires; for an
    /// existing block, when the block ends.
    pub reset_at: i64,
    /// Whether the identifier is under a hard block.
    pub blocked: bool,
    /// Milliseconds left on the block; zero when not blocked.
    pub block_remaining_ms: i64,
}

impl Decision {
    pub(crate) fn admitted(remaining: u32, reset_at: i64) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_at,
            blocked: false,
            block_remaining_ms: 0,
        }
    }

    pub(crate) fn blocked(blocked_until: i64, now: i64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_at: blocked_until,
            blocked: true,
            block_remaining_ms: (blocked_until - now).max(0),
        }
    }

    /// A block created by this evaluation. `reset_at` still follows the
    /// window while the caller waits out the full block.
    pub(crate) fn block_started(reset_at: i64, block_ms: i64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_at,
            blocked: true,
            block_remaining_ms: block_ms,
        }
    }

    /// Milliseconds a rejected caller should wait before retrying.
    pub fn retry_after_ms(&self, now: i64) -> i64 {
        if self.blocked {
            self.block_remaining_ms
        } else {
            (self.reset_at - now).max(0)
        }
    }

    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match (self.allowed, self.blocked) {
            (true, _) => "allowed",
            (false, true) => "blocked",
            (false, false) => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_decision_reports_remaining_block() {
        let d = Decision::blocked(10_000, 4_000);
        assert!(!d.allowed);
        assert!(d.blocked);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.block_remaining_ms, 6_000);
        assert_eq!(d.retry_after_ms(4_000), 6_000);
        assert_eq!(d.label(), "blocked");
    }

    #[test]
    fn new_block_waits_out_the_block_not_the_window() {
        let d = Decision::block_started(60_000, 300_000);
        assert!(d.blocked);
        assert_eq!(d.reset_at, 60_000);
        assert_eq!(d.retry_after_ms(0), 300_000);
    }

    #[test]
    fn expired_block_never_goes_negative() {
        assert_eq!(Decision::blocked(1_000, 5_000).block_remaining_ms, 0);
    }

    #[test]
    fn serializes_with_snake_case_fields() {
        let json = serde_json::to_value(Decision::admitted(4, 60_000)).unwrap();
        assert_eq!(json["allowed"], true);
        assert_eq!(json["remaining"], 4);
        assert_eq!(json["reset_at"], 60_000);
        assert_eq!(json["block_remaining_ms"], 0);
    }
}
