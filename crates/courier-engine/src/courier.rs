// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The engine facade: every operation the HTTP API and CLI expose.

use std::sync::Arc;

use courier_config::CourierConfig;
use courier_core::validation::normalize_identifier;
use courier_core::{Clock, CourierError, DispatchAdapter, PluginAdapter};
use courier_ledger::{DailyStats, DeliveryLogEntry, OutcomeRecorder};
use courier_limiter::{AdmissionController, Decision};
use courier_queue::{
    Enqueued, JobEvent, JobStore, JobView, PoolConfig, RetryPolicy, WorkerPool,
};
use courier_storage::Database;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use crate::request::{BulkItemResult, BulkRequest, HealthReport, QueueStats, SendRequest};
use crate::runtime::apply_event;

/// Admission-controlled, retrying SMS dispatch engine.
pub struct Courier {
    pub(crate) db: Database,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) dispatcher: Arc<dyn DispatchAdapter>,
    pub(crate) limiter: Arc<AdmissionController>,
    pub(crate) store: Arc<JobStore>,
    pub(crate) recorder: Arc<OutcomeRecorder>,
    pub(crate) pool: Arc<WorkerPool>,
    /// Taken by [`Courier::start`]; until then events are applied inline.
    pub(crate) events: Mutex<Option<mpsc::Receiver<JobEvent>>>,
    default_priority: i64,
    max_delay_ms: u64,
}

impl Courier {
    /// Wire every component onto one database.
    pub fn new(
        config: &CourierConfig,
        db: Database,
        dispatcher: Arc<dyn DispatchAdapter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limiter = Arc::new(AdmissionController::new(
            db.clone(),
            &config.limiter,
            clock.clone(),
        ));
        let store = Arc::new(JobStore::new(db.clone(), &config.queue, clock.clone()));
        let recorder = Arc::new(OutcomeRecorder::new(
            db.clone(),
            &config.ledger,
            clock.clone(),
        ));
        let (tx, rx) = mpsc::channel(config.queue.event_buffer.max(1));
        let pool = Arc::new(WorkerPool::new(
            store.clone(),
            dispatcher.clone(),
            RetryPolicy::from_queue_config(&config.queue),
            PoolConfig::from_queue_config(&config.queue),
            tx,
            clock.clone(),
        ));

        info!(
            dispatcher = dispatcher.name(),
            window_ms = config.limiter.window_ms,
            max_requests = config.limiter.max_requests,
            concurrency = config.queue.concurrency,
            "courier engine initialized"
        );

        Self {
            db,
            clock,
            dispatcher,
            limiter,
            store,
            recorder,
            pool,
            events: Mutex::new(Some(rx)),
            default_priority: config.queue.default_priority,
            max_delay_ms: config.queue.max_delay_ms,
        }
    }

    /// Validate, admit, and enqueue one message.
    ///
    /// Invalid requests fail before touching the rate limiter. Rejected
    /// requests return [`CourierError::RateLimited`] with reset guidance.
    pub async fn submit(&self, request: SendRequest) -> Result<Enqueued, CourierError> {
        let (job, options) = request.into_job(self.default_priority, self.max_delay_ms)?;

        let decision = self.limiter.evaluate(&job.identifier).await;
        if !decision.allowed {
            let now = self.clock.now_ms();
            debug!(identifier = %job.identifier, "submission rate limited");
            return Err(CourierError::RateLimited {
                identifier: job.identifier,
                reset_at: decision.reset_at,
                retry_after_ms: decision.retry_after_ms(now),
            });
        }

        let enqueued = self.store.enqueue(job, options).await?;
        self.pool.notify();
        Ok(enqueued)
    }

    /// Submit each message independently. Results are in input order.
    pub async fn submit_bulk(&self, request: BulkRequest) -> Vec<BulkItemResult> {
        let items = request.into_items();
        let mut results = Vec::with_capacity(items.len());
        for (index, message) in items.into_iter().enumerate() {
            let result = match self.submit(message).await {
                Ok(enqueued) => BulkItemResult {
                    index,
                    job_id: Some(enqueued.job_id),
                    position: Some(enqueued.position),
                    error: None,
                },
                Err(e) => BulkItemResult {
                    index,
                    job_id: None,
                    position: None,
                    error: Some(e.to_string()),
                },
            };
            results.push(result);
        }
        let accepted = results.iter().filter(|r| r.is_accepted()).count();
        info!(
            total = results.len(),
            accepted,
            rejected = results.len() - accepted,
            "bulk submission processed"
        );
        results
    }

    /// Current view of one job.
    pub async fn job_status(&self, job_id: &str) -> Result<JobView, CourierError> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| CourierError::NotFound(format!("job `{job_id}`")))
    }

    pub async fn queue_stats(&self) -> Result<QueueStats, CourierError> {
        Ok(QueueStats {
            counts: self.store.counts().await?,
            paused: self.pool.is_paused(),
        })
    }

    /// Delivery log, newest first.
    pub async fn logs(&self, limit: u32, offset: u32) -> Result<Vec<DeliveryLogEntry>, CourierError> {
        self.recorder.query_logs(limit, offset).await
    }

    /// Counters for one `YYYY-MM-DD` day.
    pub async fn daily_stats(&self, date: &str) -> Result<DailyStats, CourierError> {
        self.recorder.query_daily_stats(date).await
    }

    /// Window state for an identifier, without consuming capacity.
    pub async fn rate_limit_status(&self, identifier: &str) -> Result<Decision, CourierError> {
        let identifier = normalize_identifier(identifier)?;
        self.limiter.status(&identifier).await
    }

    /// Clear an identifier's window and block.
    pub async fn reset_rate_limit(&self, identifier: &str) -> Result<bool, CourierError> {
        let identifier = normalize_identifier(identifier)?;
        Ok(self.limiter.reset(&identifier).await)
    }

    pub fn pause(&self) {
        self.pool.pause();
    }

    pub fn resume(&self) {
        self.pool.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.pool.is_paused()
    }

    /// Claim and dispatch one job inline, then apply pending events.
    ///
    /// Only for use when the background runtime is not started.
    pub async fn process_next(&self) -> Result<Option<JobEvent>, CourierError> {
        let event = self.pool.process_next().await?;
        self.apply_pending().await;
        Ok(event)
    }

    /// Run stalled-job recovery inline and apply the resulting events.
    pub async fn sweep_stalled(&self) -> Vec<JobEvent> {
        let events = self.pool.sweep_stalled().await;
        self.apply_pending().await;
        events
    }

    /// Apply queued events when no background consumer owns the channel.
    async fn apply_pending(&self) {
        let mut guard = self.events.lock().await;
        if let Some(rx) = guard.as_mut() {
            while let Ok(event) = rx.try_recv() {
                apply_event(&self.recorder, event).await;
            }
        }
    }

    pub async fn health(&self) -> HealthReport {
        let storage = self
            .db
            .health_check()
            .await
            .unwrap_or_else(|e| courier_core::HealthStatus::Unhealthy(e.to_string()));
        let dispatcher = self
            .dispatcher
            .health_check()
            .await
            .unwrap_or_else(|e| courier_core::HealthStatus::Unhealthy(e.to_string()));
        HealthReport {
            storage,
            dispatcher,
        }
    }

    /// Shut down the dispatcher and flush the database.
    pub async fn shutdown(&self) -> Result<(), CourierError> {
        self.dispatcher.shutdown().await?;
        self.db.shutdown().await?;
        info!("courier engine shut down");
        Ok(())
    }
}
