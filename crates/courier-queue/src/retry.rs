// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential backoff for failed dispatch attempts.

use courier_config::model::QueueConfig;
use courier_core::CourierError;
use rand::Rng;

/// What to do with a job whose attempt just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule another attempt after `delay_ms`.
    Retry { delay_ms: u64 },
    /// Mark the job failed.
    GiveUp,
}

/// Backoff schedule: `base * 2^(attempts - 1)`, capped at `max`, with an
/// optional ±`jitter` fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base_ms: u64,
    pub max_ms: u64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_ms: defaults::base_ms(),
            max_ms: defaults::max_ms(),
            jitter: defaults::jitter(),
        }
    }
}

impl RetryPolicy {
    pub fn from_queue_config(config: &QueueConfig) -> Self {
        Self {
            base_ms: config.backoff_base_ms,
            max_ms: config.backoff_max_ms,
            jitter: config.backoff_jitter,
        }
    }

    /// Decide the fate of a job after attempt number `attempts` failed.
    ///
    /// Non-retryable errors and exhausted jobs give up immediately.
    pub fn decide(&self, error: &CourierError, attempts: u32, max_attempts: u32) -> RetryDecision {
        if !error.is_retryable() || !Self::should_retry(attempts, max_attempts) {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            delay_ms: self.delay_ms(attempts),
        }
    }

    /// Whether a job that has used `attempts` may be tried again.
    pub const fn should_retry(attempts: u32, max_attempts: u32) -> bool {
        attempts < max_attempts
    }

    /// Backoff before the attempt following attempt number `attempts`.
    pub fn delay_ms(&self, attempts: u32) -> u64 {
        let exponent = attempts.saturating_sub(1).min(63);
        let delay = self
            .base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_ms);
        self.apply_jitter(delay)
    }

    fn apply_jitter(&self, delay: u64) -> u64 {
        if self.jitter <= 0.0 || delay == 0 {
            return delay;
        }
        let spread = (delay as f64 * self.jitter).round() as i64;
        if spread == 0 {
            return delay;
        }
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        (delay as i64).saturating_add(offset).max(0) as u64
    }
}

mod defaults {
    pub const fn base_ms() -> u64 {
        2_000
    }

    pub const fn max_ms() -> u64 {
        3_600_000
    }

    pub const fn jitter() -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            base_ms: 2_000,
            max_ms: 60_000,
            jitter: 0.0,
        }
    }

    fn transient() -> CourierError {
        CourierError::dispatch("gateway unavailable", Some(503))
    }

    #[test]
    fn doubles_from_base() {
        let p = policy();
        assert_eq!(p.delay_ms(1), 2_000);
        assert_eq!(p.delay_ms(2), 4_000);
        assert_eq!(p.delay_ms(3), 8_000);
        assert_eq!(p.delay_ms(5), 32_000);
    }

    #[test]
    fn caps_at_max() {
        let p = policy();
        assert_eq!(p.delay_ms(6), 60_000);
        assert_eq!(p.delay_ms(200), 60_000);
    }

    #[test]
    fn retries_until_attempts_exhausted() {
        let p = policy();
        assert_eq!(
            p.decide(&transient(), 1, 3),
            RetryDecision::Retry { delay_ms: 2_000 }
        );
        assert_eq!(
            p.decide(&transient(), 2, 3),
            RetryDecision::Retry { delay_ms: 4_000 }
        );
        assert_eq!(p.decide(&transient(), 3, 3), RetryDecision::GiveUp);
    }

    #[test]
    fn validation_errors_are_not_retried() {
        let err = CourierError::Validation("invalid recipient".into());
        assert_eq!(policy().decide(&err, 1, 5), RetryDecision::GiveUp);
    }

    #[test]
    fn defaults_match_queue_config() {
        assert_eq!(
            RetryPolicy::from_queue_config(&QueueConfig::default()),
            RetryPolicy::default()
        );
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let p = RetryPolicy {
            jitter: 0.25,
            ..policy()
        };
        for _ in 0..200 {
            let d = p.delay_ms(2);
            assert!((3_000..=5_000).contains(&d), "delay {d} out of bounds");
        }
    }

    proptest! {
        #[test]
        fn delay_is_monotonic_without_jitter(base in 1u64..100_000, max in 1u64..10_000_000, n in 1u32..80) {
            let p = RetryPolicy { base_ms: base, max_ms: max, jitter: 0.0 };
            prop_assert!(p.delay_ms(n) <= p.delay_ms(n + 1));
            prop_assert!(p.delay_ms(n) <= max);
        }
    }
}
