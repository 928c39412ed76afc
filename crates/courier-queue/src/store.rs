// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job store with priority scheduling and atomic claims.
//!
//! Jobs are claimed by a single `UPDATE ... RETURNING` statement, so two
//! workers can never claim the same job. Every claim bumps the job's
//! `lease`; outcome transitions are compare-and-set on `(id, active, lease)`
//! and report [`Transition::Stale`] when the claim has been superseded.

use std::sync::Arc;

use courier_config::model::QueueConfig;
use courier_core::{Clock, CourierError, DispatchReceipt, JobId, Outcome};
use courier_storage::{Database, map_tr_err};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, Transaction, params};
use tracing::{debug, warn};

use crate::job::{
    ClaimedJob, EnqueueOptions, Enqueued, FinishedJob, JobState, JobView, NewJob, QueueCounts,
    StallRecovery, Transition,
};

/// Error text recorded on a job that stalled twice.
pub const STALLED_ERROR: &str = "job stalled more than allowable limit";

const JOB_COLUMNS: &str = "id, state, recipient, body, identifier, priority, metadata, attempts,
     max_attempts, delay_until, created_at, updated_at, finished_at, receipt, error";

/// SQLite-backed job store.
pub struct JobStore {
    db: Database,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    stalled_interval_ms: i64,
    keep_completed: u32,
    keep_failed: u32,
}

impl JobStore {
    pub fn new(db: Database, config: &QueueConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            max_attempts: config.max_attempts,
            stalled_interval_ms: config.stalled_interval_ms as i64,
            keep_completed: config.keep_completed,
            keep_failed: config.keep_failed,
        }
    }

    /// Current time according to the store's clock.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Insert a new job and report its position in the dispatch order.
    pub async fn enqueue(
        &self,
        job: NewJob,
        options: EnqueueOptions,
    ) -> Result<Enqueued, CourierError> {
        let now = self.clock.now_ms();
        let id = JobId::generate();
        let metadata = serde_json::to_string(&job.metadata)
            .map_err(|e| CourierError::Validation(format!("metadata is not serializable: {e}")))?;
        let max_attempts = self.max_attempts;
        let state = if options.delay_ms > 0 {
            JobState::Delayed
        } else {
            JobState::Waiting
        };
        let delay_until = i64::try_from(options.delay_ms)
            .ok()
            .and_then(|delay| now.checked_add(delay))
            .ok_or_else(|| {
                CourierError::Validation(format!(
                    "delay_ms {} is out of range",
                    options.delay_ms
                ))
            })?;
        let priority = options.priority;
        let job_id = id.clone();

        let position = self
            .db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO jobs (id, recipient, body, identifier, priority, metadata, state,
                                       delay_until, attempts, max_attempts, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?10)",
                    params![
                        job_id.as_str(),
                        job.recipient,
                        job.body,
                        job.identifier,
                        priority,
                        metadata,
                        state.to_string(),
                        delay_until,
                        max_attempts,
                        now,
                    ],
                )?;
                let seq = tx.last_insert_rowid();
                let position: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM jobs
                     WHERE state IN ('waiting', 'delayed')
                       AND (priority < ?1 OR (priority = ?1 AND seq <= ?2))",
                    params![priority, seq],
                    |row| row.get(0),
                )?;
                tx.commit()?;
                Ok(position as u64)
            })
            .await
            .map_err(map_tr_err)?;

        metrics::counter!("courier_jobs_enqueued_total").increment(1);
        debug!(job_id = %id, priority, delay_ms = options.delay_ms, position, "job enqueued");
        Ok(Enqueued {
            job_id: id,
            position,
        })
    }

    /// Atomically claim the next eligible job, moving it to `Active`.
    ///
    /// Eligible means waiting or delayed with `delay_until <= now`; ordering
    /// is ascending priority then enqueue sequence. Claiming counts as the
    /// start of an attempt.
    pub async fn claim_next(&self) -> Result<Option<ClaimedJob>, CourierError> {
        let now = self.clock.now_ms();
        self.db
            .connection()
            .call(move |conn| {
                conn.query_row(
                    "UPDATE jobs
                     SET state = 'active', attempts = attempts + 1, lease = lease + 1,
                         claimed_at = ?1, updated_at = ?1
                     WHERE seq = (
                         SELECT seq FROM jobs
                         WHERE state IN ('waiting', 'delayed') AND delay_until <= ?1
                         ORDER BY priority ASC, seq ASC
                         LIMIT 1
                     )
                     AND state IN ('waiting', 'delayed')
                     RETURNING id, recipient, body, identifier, metadata, priority, attempts,
                               max_attempts, lease, created_at",
                    params![now],
                    |row| {
                        Ok(ClaimedJob {
                            id: JobId(row.get(0)?),
                            recipient: row.get(1)?,
                            body: row.get(2)?,
                            identifier: row.get(3)?,
                            metadata: parse_json(row.get::<_, String>(4)?),
                            priority: row.get(5)?,
                            attempts: row.get(6)?,
                            max_attempts: row.get(7)?,
                            lease: row.get(8)?,
                            created_at: row.get(9)?,
                        })
                    },
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Look up a job by id.
    pub async fn get(&self, job_id: &str) -> Result<Option<JobView>, CourierError> {
        let job_id = job_id.to_string();
        let now = self.clock.now_ms();
        self.db
            .connection()
            .call(move |conn| {
                conn.query_row(
                    &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                    params![job_id],
                    |row| job_view_from_row(row, now),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Job counts per reported state.
    pub async fn counts(&self) -> Result<QueueCounts, CourierError> {
        let now = self.clock.now_ms();
        self.db
            .connection()
            .call(move |conn| {
                conn.query_row(
                    "SELECT
                         COALESCE(SUM(state = 'waiting' OR (state = 'delayed' AND delay_until <= ?1)), 0),
                         COALESCE(SUM(state = 'delayed' AND delay_until > ?1), 0),
                         COALESCE(SUM(state = 'active'), 0),
                         COALESCE(SUM(state = 'completed'), 0),
                         COALESCE(SUM(state = 'failed'), 0)
                     FROM jobs",
                    params![now],
                    |row| {
                        Ok(QueueCounts {
                            waiting: row.get::<_, i64>(0)? as u64,
                            delayed: row.get::<_, i64>(1)? as u64,
                            active: row.get::<_, i64>(2)? as u64,
                            completed: row.get::<_, i64>(3)? as u64,
                            failed: row.get::<_, i64>(4)? as u64,
                        })
                    },
                )
            })
            .await
            .map_err(map_tr_err)
    }

    /// Mark a claimed job completed with the gateway receipt.
    pub async fn complete(
        &self,
        claim: &ClaimedJob,
        receipt: &DispatchReceipt,
    ) -> Result<Transition, CourierError> {
        let receipt = serde_json::to_string(receipt)
            .map_err(|e| CourierError::Internal(format!("receipt serialization failed: {e}")))?;
        self.finish(claim, JobState::Completed, Some(receipt), None)
            .await
    }

    /// Mark a claimed job permanently failed.
    pub async fn fail(&self, claim: &ClaimedJob, error: &str) -> Result<Transition, CourierError> {
        self.finish(claim, JobState::Failed, None, Some(error.to_string()))
            .await
    }

    async fn finish(
        &self,
        claim: &ClaimedJob,
        state: JobState,
        receipt: Option<String>,
        error: Option<String>,
    ) -> Result<Transition, CourierError> {
        let now = self.clock.now_ms();
        let id = claim.id.0.clone();
        let lease = claim.lease;
        let keep = match state {
            JobState::Completed => self.keep_completed,
            _ => self.keep_failed,
        };

        let changed = self
            .db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let changed = tx.execute(
                    "UPDATE jobs
                     SET state = ?1, receipt = ?2, error = ?3, finished_at = ?4,
                         updated_at = ?4, claimed_at = NULL
                     WHERE id = ?5 AND state = 'active' AND lease = ?6",
                    params![state.to_string(), receipt, error, now, id, lease],
                )?;
                if changed > 0 {
                    trim_terminal(&tx, state, keep)?;
                }
                tx.commit()?;
                Ok(changed)
            })
            .await
            .map_err(map_tr_err)?;

        Ok(self.transition(claim, changed, now, state))
    }

    /// Put a claimed job back as `Delayed` until `delay_until`.
    pub async fn retry_later(
        &self,
        claim: &ClaimedJob,
        delay_until: i64,
        error: &str,
    ) -> Result<Transition, CourierError> {
        let now = self.clock.now_ms();
        let id = claim.id.0.clone();
        let lease = claim.lease;
        let error = error.to_string();

        let changed = self
            .db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE jobs
                     SET state = 'delayed', delay_until = ?1, error = ?2,
                         updated_at = ?3, claimed_at = NULL
                     WHERE id = ?4 AND state = 'active' AND lease = ?5",
                    params![delay_until, error, now, id, lease],
                )
            })
            .await
            .map_err(map_tr_err)?;

        Ok(self.transition(claim, changed, now, JobState::Delayed))
    }

    fn transition(&self, claim: &ClaimedJob, changed: usize, now: i64, to: JobState) -> Transition {
        if changed == 0 {
            warn!(
                job_id = %claim.id,
                lease = claim.lease,
                to = %to,
                "claim superseded, outcome discarded"
            );
            Transition::Stale
        } else {
            debug!(job_id = %claim.id, attempts = claim.attempts, to = %to, "job transitioned");
            Transition::Applied { at: now }
        }
    }

    /// Recover jobs stuck in `Active` past the stalled interval.
    ///
    /// A first stall returns the job to waiting without counting the lost
    /// attempt. A second stall fails the job.
    pub async fn recover_stalled(&self) -> Result<Vec<StallRecovery>, CourierError> {
        let now = self.clock.now_ms();
        let cutoff = now - self.stalled_interval_ms;
        let keep_failed = self.keep_failed;

        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let stalled: Vec<(String, String, String, String, u32, u32, i64)> = {
                    let mut stmt = tx.prepare(
                        "SELECT id, recipient, body, identifier, attempts, stall_count, created_at
                         FROM jobs
                         WHERE state = 'active' AND claimed_at <= ?1
                         ORDER BY seq ASC",
                    )?;
                    let rows = stmt.query_map(params![cutoff], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                        ))
                    })?;
                    rows.collect::<Result<_, _>>()?
                };

                let mut recovered = Vec::with_capacity(stalled.len());
                let mut any_failed = false;
                for (id, recipient, body, identifier, attempts, stall_count, created_at) in stalled {
                    if stall_count == 0 {
                        tx.execute(
                            "UPDATE jobs
                             SET state = 'waiting', stall_count = stall_count + 1,
                                 attempts = MAX(attempts - 1, 0), claimed_at = NULL,
                                 delay_until = ?1, updated_at = ?1
                             WHERE id = ?2",
                            params![now, id],
                        )?;
                        recovered.push(StallRecovery::Requeued(JobId(id)));
                    } else {
                        tx.execute(
                            "UPDATE jobs
                             SET state = 'failed', stall_count = stall_count + 1, error = ?1,
                                 claimed_at = NULL, finished_at = ?2, updated_at = ?2
                             WHERE id = ?3",
                            params![STALLED_ERROR, now, id],
                        )?;
                        any_failed = true;
                        recovered.push(StallRecovery::Failed(FinishedJob {
                            id: JobId(id),
                            recipient,
                            body,
                            identifier,
                            attempts,
                            created_at,
                            finished_at: now,
                            outcome: Outcome::Failure,
                            receipt: None,
                            error: Some(STALLED_ERROR.to_string()),
                        }));
                    }
                }
                if any_failed {
                    trim_terminal(&tx, JobState::Failed, keep_failed)?;
                }
                tx.commit()?;
                Ok(recovered)
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Keep only the newest `keep` jobs in a terminal state.
fn trim_terminal(tx: &Transaction<'_>, state: JobState, keep: u32) -> Result<usize, rusqlite::Error> {
    let removed = tx.execute(
        "DELETE FROM jobs
         WHERE state = ?1 AND seq NOT IN (
             SELECT seq FROM jobs WHERE state = ?1
             ORDER BY finished_at DESC, seq DESC
             LIMIT ?2
         )",
        params![state.to_string(), keep],
    )?;
    if removed > 0 {
        debug!(state = %state, removed, "trimmed finished jobs");
    }
    Ok(removed)
}

fn parse_json(text: String) -> serde_json::Value {
    serde_json::from_str(&text).unwrap_or(serde_json::Value::Null)
}

fn job_view_from_row(row: &Row<'_>, now: i64) -> Result<JobView, rusqlite::Error> {
    let state: String = row.get(1)?;
    let state: JobState = state
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    let delay_until: i64 = row.get(9)?;
    let receipt: Option<String> = row.get(13)?;

    Ok(JobView {
        id: JobId(row.get(0)?),
        state: state.reported(delay_until, now),
        recipient: row.get(2)?,
        body: row.get(3)?,
        identifier: row.get(4)?,
        priority: row.get(5)?,
        metadata: parse_json(row.get(6)?),
        attempts: row.get(7)?,
        max_attempts: row.get(8)?,
        delay_until,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        finished_at: row.get(12)?,
        receipt: receipt.and_then(|r| serde_json::from_str(&r).ok()),
        error: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ManualClock;

    const START: i64 = 1_700_000_000_000;

    async fn setup(config: QueueConfig) -> (JobStore, Arc<ManualClock>) {
        let db = Database::open_in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(START));
        (JobStore::new(db, &config, clock.clone()), clock)
    }

    fn job(n: u32) -> NewJob {
        NewJob {
            recipient: format!("+1555010{n:04}"),
            body: format!("message {n}"),
            identifier: "tenant".into(),
            metadata: serde_json::json!({ "n": n }),
        }
    }

    fn receipt() -> DispatchReceipt {
        DispatchReceipt {
            message_id: "SM123".into(),
            status: "queued".into(),
            cost: Some(0.0075),
        }
    }

    #[tokio::test]
    async fn enqueue_reports_position_in_dispatch_order() {
        let (store, _clock) = setup(QueueConfig::default()).await;
        let a = store.enqueue(job(1), EnqueueOptions::default()).await.unwrap();
        let b = store.enqueue(job(2), EnqueueOptions::default()).await.unwrap();
        let urgent = store
            .enqueue(job(3), EnqueueOptions { priority: -5, delay_ms: 0 })
            .await
            .unwrap();
        assert_eq!(a.position, 1);
        assert_eq!(b.position, 2);
        assert_eq!(urgent.position, 1);
    }

    #[tokio::test]
    async fn claims_by_priority_then_fifo() {
        let (store, _clock) = setup(QueueConfig::default()).await;
        let low = store
            .enqueue(job(1), EnqueueOptions { priority: 5, delay_ms: 0 })
            .await
            .unwrap();
        let first = store.enqueue(job(2), EnqueueOptions::default()).await.unwrap();
        let second = store.enqueue(job(3), EnqueueOptions::default()).await.unwrap();

        let order: Vec<JobId> = [
            store.claim_next().await.unwrap().unwrap(),
            store.claim_next().await.unwrap().unwrap(),
            store.claim_next().await.unwrap().unwrap(),
        ]
        .into_iter()
        .map(|c| c.id)
        .collect();
        assert_eq!(order, vec![first.job_id, second.job_id, low.job_id]);
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_marks_active_and_counts_attempt() {
        let (store, _clock) = setup(QueueConfig::default()).await;
        let queued = store.enqueue(job(1), EnqueueOptions::default()).await.unwrap();
        let claim = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claim.id, queued.job_id);
        assert_eq!(claim.attempts, 1);
        assert_eq!(claim.lease, 1);
        assert_eq!(claim.metadata["n"], 1);

        let view = store.get(claim.id.as_str()).await.unwrap().unwrap();
        assert_eq!(view.state, JobState::Active);
        assert_eq!(view.attempts, 1);
    }

    #[tokio::test]
    async fn delayed_jobs_wait_for_their_time() {
        let (store, clock) = setup(QueueConfig::default()).await;
        let queued = store
            .enqueue(job(1), EnqueueOptions { priority: 0, delay_ms: 5_000 })
            .await
            .unwrap();
        assert!(store.claim_next().await.unwrap().is_none());
        let view = store.get(queued.job_id.as_str()).await.unwrap().unwrap();
        assert_eq!(view.state, JobState::Delayed);
        assert_eq!(store.counts().await.unwrap().delayed, 1);

        clock.advance(5_000);
        let view = store.get(queued.job_id.as_str()).await.unwrap().unwrap();
        assert_eq!(view.state, JobState::Waiting);
        let counts = store.counts().await.unwrap();
        assert_eq!((counts.waiting, counts.delayed), (1, 0));
        assert!(store.claim_next().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn out_of_range_delay_is_rejected_without_inserting() {
        let (store, _clock) = setup(QueueConfig::default()).await;
        for delay_ms in [u64::MAX, i64::MAX as u64] {
            let result = store
                .enqueue(job(1), EnqueueOptions { priority: 0, delay_ms })
                .await;
            assert!(matches!(result, Err(CourierError::Validation(_))));
        }
        let counts = store.counts().await.unwrap();
        assert_eq!((counts.waiting, counts.delayed), (0, 0));
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn complete_stores_receipt() {
        let (store, clock) = setup(QueueConfig::default()).await;
        store.enqueue(job(1), EnqueueOptions::default()).await.unwrap();
        let claim = store.claim_next().await.unwrap().unwrap();
        clock.advance(120);

        let t = store.complete(&claim, &receipt()).await.unwrap();
        assert_eq!(t, Transition::Applied { at: START + 120 });

        let view = store.get(claim.id.as_str()).await.unwrap().unwrap();
        assert_eq!(view.state, JobState::Completed);
        assert_eq!(view.receipt, Some(receipt()));
        assert_eq!(view.finished_at, Some(START + 120));
    }

    #[tokio::test]
    async fn retry_later_moves_to_delayed() {
        let (store, _clock) = setup(QueueConfig::default()).await;
        store.enqueue(job(1), EnqueueOptions::default()).await.unwrap();
        let claim = store.claim_next().await.unwrap().unwrap();
        store
            .retry_later(&claim, START + 2_000, "gateway 503")
            .await
            .unwrap();

        let view = store.get(claim.id.as_str()).await.unwrap().unwrap();
        assert_eq!(view.state, JobState::Delayed);
        assert_eq!(view.delay_until, START + 2_000);
        assert_eq!(view.error.as_deref(), Some("gateway 503"));
        assert_eq!(view.attempts, 1);
    }

    #[tokio::test]
    async fn transitions_on_stale_claims_are_rejected() {
        let (store, _clock) = setup(QueueConfig::default()).await;
        store.enqueue(job(1), EnqueueOptions::default()).await.unwrap();
        let claim = store.claim_next().await.unwrap().unwrap();
        store.fail(&claim, "boom").await.unwrap();

        assert_eq!(store.complete(&claim, &receipt()).await.unwrap(), Transition::Stale);
        assert_eq!(
            store.retry_later(&claim, START, "again").await.unwrap(),
            Transition::Stale
        );
        let view = store.get(claim.id.as_str()).await.unwrap().unwrap();
        assert_eq!(view.state, JobState::Failed);
    }

    #[tokio::test]
    async fn stalled_job_is_requeued_once_then_failed() {
        let config = QueueConfig {
            stalled_interval_ms: 1_000,
            ..QueueConfig::default()
        };
        let (store, clock) = setup(config).await;
        store.enqueue(job(1), EnqueueOptions::default()).await.unwrap();
        let first = store.claim_next().await.unwrap().unwrap();

        clock.advance(999);
        assert!(store.recover_stalled().await.unwrap().is_empty());

        clock.advance(1);
        let recovered = store.recover_stalled().await.unwrap();
        assert_eq!(recovered, vec![StallRecovery::Requeued(first.id.clone())]);
        let view = store.get(first.id.as_str()).await.unwrap().unwrap();
        assert_eq!(view.state, JobState::Waiting);
        assert_eq!(view.attempts, 0);

        // The stalled worker's late outcome must not land.
        assert_eq!(store.complete(&first, &receipt()).await.unwrap(), Transition::Stale);

        let second = store.claim_next().await.unwrap().unwrap();
        assert_eq!(second.lease, 2);
        assert_eq!(second.attempts, 1);

        clock.advance(1_000);
        let recovered = store.recover_stalled().await.unwrap();
        match recovered.as_slice() {
            [StallRecovery::Failed(done)] => {
                assert_eq!(done.id, first.id);
                assert_eq!(done.error.as_deref(), Some(STALLED_ERROR));
                assert_eq!(done.outcome, Outcome::Failure);
            }
            other => panic!("unexpected recovery: {other:?}"),
        }
        let view = store.get(first.id.as_str()).await.unwrap().unwrap();
        assert_eq!(view.state, JobState::Failed);
    }

    #[tokio::test]
    async fn retention_keeps_newest_terminal_jobs() {
        let config = QueueConfig {
            keep_completed: 2,
            keep_failed: 1,
            ..QueueConfig::default()
        };
        let (store, clock) = setup(config).await;

        let mut completed = Vec::new();
        for n in 0..4 {
            store.enqueue(job(n), EnqueueOptions::default()).await.unwrap();
            let claim = store.claim_next().await.unwrap().unwrap();
            clock.advance(10);
            store.complete(&claim, &receipt()).await.unwrap();
            completed.push(claim.id);
        }
        for n in 4..6 {
            store.enqueue(job(n), EnqueueOptions::default()).await.unwrap();
            let claim = store.claim_next().await.unwrap().unwrap();
            clock.advance(10);
            store.fail(&claim, "nope").await.unwrap();
        }

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.failed, 1);
        assert!(store.get(completed[0].as_str()).await.unwrap().is_none());
        assert!(store.get(completed[3].as_str()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn counts_on_empty_store_are_zero() {
        let (store, _clock) = setup(QueueConfig::default()).await;
        assert_eq!(store.counts().await.unwrap(), QueueCounts::default());
        assert!(store.get("missing").await.unwrap().is_none());
    }
}
