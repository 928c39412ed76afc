// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-identifier sliding-window rate limiter with a hard block.
//!
//! Every admitted request is stored as one row in `rate_limit_events`.
//! A request arriving when the window is full creates a row in
//! `rate_limit_blocks`, and every request for that identifier is rejected
//! until the block expires, whatever the window holds by then.

use std::sync::Arc;

use courier_config::model::LimiterConfig;
use courier_core::{Clock, CourierError};
use courier_storage::{Database, map_tr_err};
use rusqlite::{OptionalExtension, params};
use tracing::{debug, info, warn};

use crate::decision::Decision;

/// Sliding-window admission controller backed by the shared database.
pub struct AdmissionController {
    db: Database,
    clock: Arc<dyn Clock>,
    window_ms: i64,
    max_requests: u32,
    block_ms: i64,
}

impl AdmissionController {
    pub fn new(db: Database, config: &LimiterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            window_ms: config.window_ms as i64,
            max_requests: config.max_requests,
            block_ms: config.block_ms as i64,
        }
    }

    /// Decide whether one more request from `identifier` is admitted, and
    /// record it if so.
    ///
    /// The check, pruning, block creation, and event insert run in a single
    /// transaction. If the store cannot be reached the request is admitted
    /// (fail open) with `remaining = 0`.
    pub async fn evaluate(&self, identifier: &str) -> Decision {
        let now = self.clock.now_ms();
        match self.try_evaluate(identifier, now).await {
            Ok(decision) => {
                metrics::counter!("courier_admissions_total", "decision" => decision.label())
                    .increment(1);
                if decision.blocked {
                    debug!(
                        identifier = %identifier,
                        block_remaining_ms = decision.block_remaining_ms,
                        "request rejected by rate limiter"
                    );
                }
                decision
            }
            Err(e) => {
                warn!(
                    identifier = %identifier,
                    error = %e,
                    "rate limit store unavailable, failing open"
                );
                metrics::counter!("courier_admission_fail_open_total").increment(1);
                Decision::admitted(0, now + self.window_ms)
            }
        }
    }

    async fn try_evaluate(&self, identifier: &str, now: i64) -> Result<Decision, CourierError> {
        let identifier = identifier.to_string();
        let window_ms = self.window_ms;
        let max_requests = self.max_requests;
        let block_ms = self.block_ms;

        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;

                let blocked_until: Option<i64> = tx
                    .query_row(
                        "SELECT blocked_until FROM rate_limit_blocks WHERE identifier = ?1",
                        params![identifier],
                        |row| row.get(0),
                    )
                    .optional()?;
                match blocked_until {
                    Some(until) if until > now => {
                        tx.commit()?;
                        return Ok(Decision::blocked(until, now));
                    }
                    Some(_) => {
                        tx.execute(
                            "DELETE FROM rate_limit_blocks WHERE identifier = ?1",
                            params![identifier],
                        )?;
                    }
                    None => {}
                }

                tx.execute(
                    "DELETE FROM rate_limit_events WHERE identifier = ?1 AND ts <= ?2",
                    params![identifier, now - window_ms],
                )?;

                let (count, oldest): (i64, Option<i64>) = tx.query_row(
                    "SELECT COUNT(*), MIN(ts) FROM rate_limit_events WHERE identifier = ?1",
                    params![identifier],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;

                if count >= i64::from(max_requests) {
                    let until = now + block_ms;
                    tx.execute(
                        "INSERT INTO rate_limit_blocks (identifier, blocked_until)
                         VALUES (?1, ?2)
                         ON CONFLICT(identifier) DO UPDATE SET blocked_until = excluded.blocked_until",
                        params![identifier, until],
                    )?;
                    tx.commit()?;
                    return Ok(Decision::block_started(
                        oldest.unwrap_or(now) + window_ms,
                        block_ms,
                    ));
                }

                tx.execute(
                    "INSERT INTO rate_limit_events (identifier, ts) VALUES (?1, ?2)",
                    params![identifier, now],
                )?;
                tx.commit()?;

                let remaining = (i64::from(max_requests) - count - 1).max(0) as u32;
                Ok(Decision::admitted(
                    remaining,
                    oldest.unwrap_or(now) + window_ms,
                ))
            })
            .await
            .map_err(map_tr_err)
    }

    /// Current window state for `identifier` without recording anything.
    ///
    /// Never prunes events and never creates a block; store errors are
    /// returned to the caller.
    pub async fn status(&self, identifier: &str) -> Result<Decision, CourierError> {
        let identifier = identifier.to_string();
        let now = self.clock.now_ms();
        let window_ms = self.window_ms;
        let max_requests = self.max_requests;

        self.db
            .connection()
            .call(move |conn| {
                let blocked_until: Option<i64> = conn
                    .query_row(
                        "SELECT blocked_until FROM rate_limit_blocks
                         WHERE identifier = ?1 AND blocked_until > ?2",
                        params![identifier, now],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(until) = blocked_until {
                    return Ok(Decision::blocked(until, now));
                }

                let (count, oldest): (i64, Option<i64>) = conn.query_row(
                    "SELECT COUNT(*), MIN(ts) FROM rate_limit_events
                     WHERE identifier = ?1 AND ts > ?2",
                    params![identifier, now - window_ms],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                let remaining = (i64::from(max_requests) - count).max(0) as u32;
                Ok(Decision {
                    allowed: remaining > 0,
                    remaining,
                    reset_at: oldest.unwrap_or(now) + window_ms,
                    blocked: false,
                    block_remaining_ms: 0,
                })
            })
            .await
            .map_err(map_tr_err)
    }

    /// Forget every event and any block for `identifier`.
    ///
    /// Returns `false` when the store could not be updated.
    pub async fn reset(&self, identifier: &str) -> bool {
        let id = identifier.to_string();
        let result = self
            .db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM rate_limit_events WHERE identifier = ?1",
                    params![id],
                )?;
                tx.execute(
                    "DELETE FROM rate_limit_blocks WHERE identifier = ?1",
                    params![id],
                )?;
                tx.commit()
            })
            .await
            .map_err(map_tr_err);

        match result {
            Ok(()) => {
                info!(identifier = %identifier, "rate limit reset");
                true
            }
            Err(e) => {
                warn!(identifier = %identifier, error = %e, "rate limit reset failed");
                false
            }
        }
    }

    /// Delete expired events and blocks for every identifier.
    ///
    /// Returns the number of rows removed.
    pub async fn purge_expired(&self) -> Result<u64, CourierError> {
        let now = self.clock.now_ms();
        let cutoff = now - self.window_ms;
        let removed = self
            .db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let events = tx.execute(
                    "DELETE FROM rate_limit_events WHERE ts <= ?1",
                    params![cutoff],
                )?;
                let blocks = tx.execute(
                    "DELETE FROM rate_limit_blocks WHERE blocked_until <= ?1",
                    params![now],
                )?;
                tx.commit()?;
                Ok((events + blocks) as u64)
            })
            .await
            .map_err(map_tr_err)?;
        if removed > 0 {
            debug!(removed, "purged expired rate limit rows");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ManualClock;
    use tracing_test::traced_test;

    const START: i64 = 1_700_000_000_000;

    async fn setup(window_ms: u64, max_requests: u32, block_ms: u64) -> (AdmissionController, Arc<ManualClock>) {
        let db = Database::open_in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(START));
        let config = LimiterConfig {
            window_ms,
            max_requests,
            block_ms,
        };
        (AdmissionController::new(db, &config, clock.clone()), clock)
    }

    #[tokio::test]
    async fn admits_until_capacity_then_blocks() {
        let (limiter, _clock) = setup(60_000, 3, 300_000).await;

        for expected_remaining in [2, 1, 0] {
            let d = limiter.evaluate("tenant").await;
            assert!(d.allowed);
            assert!(!d.blocked);
            assert_eq!(d.remaining, expected_remaining);
            assert_eq!(d.reset_at, START + 60_000);
        }

        let d = limiter.evaluate("tenant").await;
        assert!(!d.allowed);
        assert!(d.blocked);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.block_remaining_ms, 300_000);
        assert_eq!(d.reset_at, START + 60_000);
        assert_eq!(d.retry_after_ms(START), 300_000);
    }

    #[tokio::test]
    async fn blocked_requests_do_not_record_events() {
        let (limiter, clock) = setup(60_000, 2, 300_000).await;
        limiter.evaluate("tenant").await;
        limiter.evaluate("tenant").await;
        assert!(limiter.evaluate("tenant").await.blocked);

        clock.advance(1_000);
        let d = limiter.evaluate("tenant").await;
        assert!(d.blocked);
        assert_eq!(d.block_remaining_ms, 299_000);

        let count: i64 = limiter
            .db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM rate_limit_events", [], |r| r.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn block_holds_even_after_window_clears() {
        let (limiter, clock) = setup(1_000, 1, 10_000).await;
        assert!(limiter.evaluate("tenant").await.allowed);
        assert!(limiter.evaluate("tenant").await.blocked);

        // Window has long cleared but the block still holds.
        clock.advance(5_000);
        assert!(limiter.evaluate("tenant").await.blocked);

        clock.advance(5_000);
        let d = limiter.evaluate("tenant").await;
        assert!(d.allowed);
        assert_eq!(d.remaining, 0);
    }

    #[tokio::test]
    async fn window_slides() {
        let (limiter, clock) = setup(10_000, 2, 60_000).await;
        assert!(limiter.evaluate("tenant").await.allowed);
        clock.advance(6_000);
        assert!(limiter.evaluate("tenant").await.allowed);

        // First event expires exactly at the window boundary.
        clock.advance(4_000);
        let d = limiter.evaluate("tenant").await;
        assert!(d.allowed);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.reset_at, START + 6_000 + 10_000);
    }

    #[tokio::test]
    async fn identifiers_are_independent() {
        let (limiter, _clock) = setup(60_000, 1, 60_000).await;
        assert!(limiter.evaluate("a").await.allowed);
        assert!(limiter.evaluate("a").await.blocked);
        assert!(limiter.evaluate("b").await.allowed);
    }

    #[tokio::test]
    async fn status_agrees_with_evaluate() {
        let (limiter, _clock) = setup(60_000, 3, 300_000).await;
        let fresh = limiter.status("tenant").await.unwrap();
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 3);

        let evaluated = limiter.evaluate("tenant").await;
        let status = limiter.status("tenant").await.unwrap();
        assert_eq!(status.remaining, evaluated.remaining);
        assert_eq!(status.reset_at, evaluated.reset_at);
        assert!(status.allowed);
    }

    #[tokio::test]
    async fn status_never_creates_a_block() {
        let (limiter, _clock) = setup(60_000, 2, 300_000).await;
        limiter.evaluate("tenant").await;
        limiter.evaluate("tenant").await;

        for _ in 0..5 {
            let s = limiter.status("tenant").await.unwrap();
            assert!(!s.allowed);
            assert!(!s.blocked);
            assert_eq!(s.remaining, 0);
        }

        let blocks: i64 = limiter
            .db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM rate_limit_blocks", [], |r| r.get(0))
            })
            .await
            .unwrap();
        assert_eq!(blocks, 0);
    }

    #[tokio::test]
    async fn status_reports_active_block() {
        let (limiter, clock) = setup(60_000, 1, 120_000).await;
        limiter.evaluate("tenant").await;
        limiter.evaluate("tenant").await;
        clock.advance(20_000);
        let s = limiter.status("tenant").await.unwrap();
        assert!(s.blocked);
        assert_eq!(s.block_remaining_ms, 100_000);
    }

    #[tokio::test]
    async fn reset_clears_events_and_block() {
        let (limiter, _clock) = setup(60_000, 1, 300_000).await;
        limiter.evaluate("tenant").await;
        assert!(limiter.evaluate("tenant").await.blocked);

        assert!(limiter.reset("tenant").await);
        let d = limiter.evaluate("tenant").await;
        assert!(d.allowed);
        assert!(!d.blocked);
    }

    #[tokio::test]
    async fn reset_of_unknown_identifier_succeeds() {
        let (limiter, _clock) = setup(60_000, 1, 300_000).await;
        assert!(limiter.reset("nobody").await);
    }

    #[tokio::test]
    async fn purge_removes_only_expired_rows() {
        let (limiter, clock) = setup(10_000, 1, 20_000).await;
        limiter.evaluate("old").await;
        limiter.evaluate("old").await; // creates a block until START + 20s
        clock.advance(15_000);
        limiter.evaluate("new").await;

        // old event expired, block still active, new event live.
        assert_eq!(limiter.purge_expired().await.unwrap(), 1);

        clock.advance(6_000);
        // block expired; new event (at +15s) is still inside the window.
        assert_eq!(limiter.purge_expired().await.unwrap(), 1);
        assert_eq!(limiter.status("new").await.unwrap().remaining, 0);
    }

    #[tokio::test]
    async fn thirty_one_requests_in_one_window() {
        let (limiter, clock) = setup(60_000, 30, 300_000).await;
        for i in 0..30 {
            let d = limiter.evaluate("burst").await;
            assert!(d.allowed, "request {i} should be admitted");
            clock.advance(100);
        }
        let d = limiter.evaluate("burst").await;
        assert!(!d.allowed);
        assert!(d.blocked);
        assert_eq!(d.reset_at, START + 60_000);
        assert_eq!(d.block_remaining_ms, 300_000);

        clock.advance(299_000);
        assert!(limiter.evaluate("burst").await.blocked);

        clock.advance(1_000);
        let d = limiter.evaluate("burst").await;
        assert!(d.allowed);
        assert_eq!(d.remaining, 29);
    }

    #[tokio::test]
    #[traced_test]
    async fn fails_open_when_store_breaks() {
        let (limiter, _clock) = setup(60_000, 1, 300_000).await;
        limiter
            .db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("DROP TABLE rate_limit_events;")
            })
            .await
            .unwrap();

        for _ in 0..3 {
            let d = limiter.evaluate("tenant").await;
            assert!(d.allowed);
            assert_eq!(d.remaining, 0);
        }
        assert!(logs_contain("failing open"));
        assert!(limiter.status("tenant").await.is_err());
    }
}
