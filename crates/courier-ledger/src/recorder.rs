// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outcome recorder: a capped delivery log plus per-day outcome counters.
//!
//! Recording never fails the caller. A job that reached a terminal state
//! stays terminal whether or not its log row could be written.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use courier_config::model::LedgerConfig;
use courier_core::clock::{day_key, to_rfc3339};
use courier_core::validation::{mask_recipient, preview};
use courier_core::{Clock, CourierError, JobId, Outcome};
use courier_queue::FinishedJob;
use courier_storage::{Database, map_tr_err};
use rusqlite::types::Type;
use rusqlite::params;
use tracing::{debug, warn};

use crate::model::{DailyStats, DeliveryLogEntry};

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Writes finished jobs to the delivery log and daily statistics.
pub struct OutcomeRecorder {
    db: Database,
    clock: Arc<dyn Clock>,
    log_capacity: u32,
    retention_days: u32,
}

impl OutcomeRecorder {
    pub fn new(db: Database, config: &LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            log_capacity: config.log_capacity.max(1),
            retention_days: config.stats_retention_days.max(1),
        }
    }

    /// Record one finished job. Store errors are logged and swallowed.
    pub async fn record(&self, job: &FinishedJob) {
        if let Err(e) = self.try_record(job).await {
            warn!(job_id = %job.id, error = %e, "failed to record job outcome");
        }
    }

    async fn try_record(&self, job: &FinishedJob) -> Result<(), CourierError> {
        let job_id = job.id.0.clone();
        let recorded_at = job.finished_at;
        let recipient = mask_recipient(&job.recipient);
        let body_preview = preview(&job.body);
        let outcome = job.outcome.to_string();
        let attempts = job.attempts;
        let receipt = job
            .receipt
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CourierError::Internal(format!("receipt serialization failed: {e}")))?;
        let error = job.error.clone();
        let day = day_key(job.finished_at);
        let duration_ms = job.duration_ms();
        let cost = job.receipt.as_ref().and_then(|r| r.cost).unwrap_or(0.0);
        let capacity = self.log_capacity;
        let cutoff = self.retention_cutoff()?;

        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO delivery_log
                         (job_id, recorded_at, recipient_masked, preview, outcome, attempts,
                          receipt, error)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        job_id,
                        recorded_at,
                        recipient,
                        body_preview,
                        outcome,
                        attempts,
                        receipt,
                        error
                    ],
                )?;
                tx.execute(
                    "DELETE FROM delivery_log WHERE id NOT IN (
                         SELECT id FROM delivery_log ORDER BY id DESC LIMIT ?1
                     )",
                    params![capacity],
                )?;
                tx.execute(
                    "INSERT INTO daily_stats (day, outcome, count, total_duration_ms, total_cost)
                     VALUES (?1, ?2, 1, ?3, ?4)
                     ON CONFLICT(day, outcome) DO UPDATE SET
                         count = count + 1,
                         total_duration_ms = total_duration_ms + excluded.total_duration_ms,
                         total_cost = total_cost + excluded.total_cost",
                    params![day, outcome, duration_ms, cost],
                )?;
                tx.execute("DELETE FROM daily_stats WHERE day <= ?1", params![cutoff])?;
                tx.commit()
            })
            .await
            .map_err(map_tr_err)?;

        debug!(job_id = %job.id, outcome = %job.outcome, "job outcome recorded");
        Ok(())
    }

    /// Delivery log entries, newest first.
    pub async fn query_logs(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<DeliveryLogEntry>, CourierError> {
        let limit = limit.min(self.log_capacity);
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, job_id, recorded_at, recipient_masked, preview, outcome,
                            attempts, receipt, error
                     FROM delivery_log
                     ORDER BY id DESC
                     LIMIT ?1 OFFSET ?2",
                )?;
                let rows = stmt.query_map(params![limit, offset], |row| {
                    let outcome: String = row.get(5)?;
                    let outcome: Outcome = outcome.parse().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                    })?;
                    let recorded_at: i64 = row.get(2)?;
                    let receipt: Option<String> = row.get(7)?;
                    Ok(DeliveryLogEntry {
                        id: row.get(0)?,
                        job_id: JobId(row.get(1)?),
                        timestamp: to_rfc3339(recorded_at),
                        recorded_at,
                        recipient: row.get(3)?,
                        preview: row.get(4)?,
                        outcome,
                        attempts: row.get(6)?,
                        receipt: receipt.and_then(|r| serde_json::from_str(&r).ok()),
                        error: row.get(8)?,
                    })
                })?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Counters for one `YYYY-MM-DD` day. Unknown days report zeros.
    pub async fn query_daily_stats(&self, date: &str) -> Result<DailyStats, CourierError> {
        let day = parse_day(date)?;
        let key = day.format(DAY_FORMAT).to_string();
        let mut range = self.load_range(key.clone(), key.clone()).await?;
        Ok(range.remove(&key).unwrap_or_else(|| DailyStats::empty(key)))
    }

    /// Counters for the last `days` UTC days ending today, oldest first,
    /// with zero rows for days without activity.
    pub async fn query_range(&self, days: u32) -> Result<Vec<DailyStats>, CourierError> {
        let days = days.max(1);
        let today = self.today()?;
        let first = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .ok_or_else(|| CourierError::Validation(format!("range of {days} days is too large")))?;
        let mut found = self
            .load_range(
                first.format(DAY_FORMAT).to_string(),
                today.format(DAY_FORMAT).to_string(),
            )
            .await?;

        Ok(first
            .iter_days()
            .take(days as usize)
            .map(|d| {
                let key = d.format(DAY_FORMAT).to_string();
                found.remove(&key).unwrap_or_else(|| DailyStats::empty(key))
            })
            .collect())
    }

    async fn load_range(
        &self,
        from: String,
        to: String,
    ) -> Result<HashMap<String, DailyStats>, CourierError> {
        let rows: Vec<(String, String, i64, i64, f64)> = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT day, outcome, count, total_duration_ms, total_cost
                     FROM daily_stats WHERE day >= ?1 AND day <= ?2",
                )?;
                let rows = stmt.query_map(params![from, to], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)?;

        let mut stats: HashMap<String, DailyStats> = HashMap::new();
        for (day, outcome, count, duration_ms, cost) in rows {
            let outcome: Outcome = outcome
                .parse()
                .map_err(|_| CourierError::Internal(format!("unknown outcome `{outcome}`")))?;
            stats
                .entry(day.clone())
                .or_insert_with(|| DailyStats::empty(day))
                .add(outcome, count.max(0) as u64, duration_ms, cost);
        }
        Ok(stats)
    }

    fn today(&self) -> Result<NaiveDate, CourierError> {
        chrono::DateTime::from_timestamp_millis(self.clock.now_ms())
            .map(|t| t.date_naive())
            .ok_or_else(|| CourierError::Internal("clock is out of range".into()))
    }

    /// Newest day that falls outside the retention window.
    fn retention_cutoff(&self) -> Result<String, CourierError> {
        let today = self.today()?;
        let cutoff = today
            .checked_sub_days(Days::new(u64::from(self.retention_days)))
            .unwrap_or(NaiveDate::MIN);
        Ok(cutoff.format(DAY_FORMAT).to_string())
    }
}

fn parse_day(date: &str) -> Result<NaiveDate, CourierError> {
    NaiveDate::parse_from_str(date.trim(), DAY_FORMAT)
        .map_err(|_| CourierError::Validation(format!("invalid date `{date}`, expected YYYY-MM-DD")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{DispatchReceipt, ManualClock};
    use tracing_test::traced_test;

    // 2024-01-15T10:00:00Z
    const JAN_15: i64 = 1_705_312_800_000;
    const DAY_MS: i64 = 86_400_000;

    async fn setup(config: LedgerConfig) -> (OutcomeRecorder, Arc<ManualClock>) {
        let db = Database::open_in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(JAN_15));
        (OutcomeRecorder::new(db, &config, clock.clone()), clock)
    }

    fn finished(n: u32, outcome: Outcome, finished_at: i64) -> FinishedJob {
        let success = outcome == Outcome::Success;
        FinishedJob {
            id: JobId(format!("job-{n}")),
            recipient: "+15551234567".into(),
            body: "x".repeat(80),
            identifier: "tenant".into(),
            attempts: if success { 1 } else { 3 },
            created_at: finished_at - 200,
            finished_at,
            outcome,
            receipt: success.then(|| DispatchReceipt {
                message_id: format!("SM{n}"),
                status: "queued".into(),
                cost: Some(0.01),
            }),
            error: (!success).then(|| "gateway unavailable".to_string()),
        }
    }

    #[tokio::test]
    async fn daily_stats_count_outcomes() {
        let (recorder, _clock) = setup(LedgerConfig::default()).await;
        for n in 0..3 {
            recorder.record(&finished(n, Outcome::Success, JAN_15)).await;
        }
        for n in 3..5 {
            recorder.record(&finished(n, Outcome::Failure, JAN_15)).await;
        }

        let stats = recorder.query_daily_stats("2024-01-15").await.unwrap();
        assert_eq!(stats.date, "2024-01-15");
        assert_eq!(stats.total, 5);
        assert_eq!(stats.successful, 3);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.total_duration_ms, 1_000);
        assert!((stats.total_cost - 0.03).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_day_reports_zeros() {
        let (recorder, _clock) = setup(LedgerConfig::default()).await;
        let stats = recorder.query_daily_stats("2023-12-31").await.unwrap();
        assert_eq!(stats, DailyStats::empty("2023-12-31"));
    }

    #[tokio::test]
    async fn invalid_date_is_a_validation_error() {
        let (recorder, _clock) = setup(LedgerConfig::default()).await;
        for bad in ["2024-13-01", "yesterday", "2024-02-30", ""] {
            let err = recorder.query_daily_stats(bad).await.unwrap_err();
            assert!(matches!(err, CourierError::Validation(_)), "{bad}: {err}");
        }
    }

    #[tokio::test]
    async fn log_is_newest_first_and_redacted() {
        let (recorder, _clock) = setup(LedgerConfig::default()).await;
        recorder.record(&finished(1, Outcome::Success, JAN_15)).await;
        recorder.record(&finished(2, Outcome::Failure, JAN_15 + 1_000)).await;

        let logs = recorder.query_logs(10, 0).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].job_id, JobId("job-2".into()));
        assert_eq!(logs[0].outcome, Outcome::Failure);
        assert_eq!(logs[0].error.as_deref(), Some("gateway unavailable"));
        assert_eq!(logs[1].recipient, "********4567");
        assert_eq!(logs[1].preview, format!("{}...", "x".repeat(50)));
        assert_eq!(logs[1].timestamp, "2024-01-15T10:00:00.000Z");
        assert_eq!(
            logs[1].receipt.as_ref().map(|r| r.message_id.as_str()),
            Some("SM1")
        );

        let page = recorder.query_logs(1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].job_id, JobId("job-1".into()));
    }

    #[tokio::test]
    async fn log_is_trimmed_to_capacity() {
        let config = LedgerConfig {
            log_capacity: 3,
            ..LedgerConfig::default()
        };
        let (recorder, _clock) = setup(config).await;
        for n in 0..5 {
            recorder.record(&finished(n, Outcome::Success, JAN_15)).await;
        }
        let logs = recorder.query_logs(100, 0).await.unwrap();
        let ids: Vec<&str> = logs.iter().map(|e| e.job_id.as_str()).collect();
        assert_eq!(ids, vec!["job-4", "job-3", "job-2"]);

        // Counters are not capped with the log.
        let stats = recorder.query_daily_stats("2024-01-15").await.unwrap();
        assert_eq!(stats.total, 5);
    }

    #[tokio::test]
    async fn old_days_are_dropped_after_retention() {
        let config = LedgerConfig {
            stats_retention_days: 2,
            ..LedgerConfig::default()
        };
        let (recorder, clock) = setup(config).await;
        recorder.record(&finished(1, Outcome::Success, JAN_15)).await;

        clock.advance(DAY_MS);
        recorder.record(&finished(2, Outcome::Success, JAN_15 + DAY_MS)).await;
        assert_eq!(recorder.query_daily_stats("2024-01-15").await.unwrap().total, 1);

        clock.advance(DAY_MS);
        recorder
            .record(&finished(3, Outcome::Success, JAN_15 + 2 * DAY_MS))
            .await;
        assert_eq!(recorder.query_daily_stats("2024-01-15").await.unwrap().total, 0);
        assert_eq!(recorder.query_daily_stats("2024-01-16").await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn range_is_zero_filled_oldest_first() {
        let (recorder, clock) = setup(LedgerConfig::default()).await;
        recorder.record(&finished(1, Outcome::Success, JAN_15)).await;
        clock.advance(2 * DAY_MS);
        recorder
            .record(&finished(2, Outcome::Failure, JAN_15 + 2 * DAY_MS))
            .await;

        let range = recorder.query_range(4).await.unwrap();
        let days: Vec<&str> = range.iter().map(|s| s.date.as_str()).collect();
        assert_eq!(days, vec!["2024-01-14", "2024-01-15", "2024-01-16", "2024-01-17"]);
        let totals: Vec<u64> = range.iter().map(|s| s.total).collect();
        assert_eq!(totals, vec![0, 1, 0, 1]);
        assert_eq!(range[3].failed, 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn record_swallows_store_errors() {
        let (recorder, _clock) = setup(LedgerConfig::default()).await;
        recorder
            .db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("DROP TABLE delivery_log;")
            })
            .await
            .unwrap();

        recorder.record(&finished(1, Outcome::Success, JAN_15)).await;
        assert!(logs_contain("failed to record job outcome"));
        assert!(recorder.query_logs(10, 0).await.is_err());
    }
}
