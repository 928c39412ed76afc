// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded-concurrency worker pool.
//!
//! The pool claims jobs from the [`JobStore`] only while it holds a free
//! concurrency permit, so no more than `concurrency` dispatches are ever in
//! flight. Each claimed job runs on its own task and reports a [`JobEvent`]
//! on the event channel when it settles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use courier_config::model::QueueConfig;
use courier_core::validation::{normalize_body, normalize_recipient};
use courier_core::{Clock, CourierError, DispatchAdapter, DispatchReceipt, Outcome};
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events::JobEvent;
use crate::job::{ClaimedJob, StallRecovery, Transition};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::store::JobStore;

/// Worker pool tuning.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub stalled_interval: Duration,
    pub shutdown_timeout: Duration,
}

impl PoolConfig {
    pub fn from_queue_config(config: &QueueConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            stalled_interval: Duration::from_millis(config.stalled_interval_ms),
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
        }
    }
}

/// Claims jobs and dispatches them through a [`DispatchAdapter`].
pub struct WorkerPool {
    store: Arc<JobStore>,
    dispatcher: Arc<dyn DispatchAdapter>,
    policy: RetryPolicy,
    config: PoolConfig,
    events: mpsc::Sender<JobEvent>,
    clock: Arc<dyn Clock>,
    permits: Arc<Semaphore>,
    paused: AtomicBool,
    wake: Notify,
}

impl WorkerPool {
    pub fn new(
        store: Arc<JobStore>,
        dispatcher: Arc<dyn DispatchAdapter>,
        policy: RetryPolicy,
        config: PoolConfig,
        events: mpsc::Sender<JobEvent>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.concurrency));
        Self {
            store,
            dispatcher,
            policy,
            config,
            events,
            clock,
            permits,
            paused: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    /// Run until `cancel` fires, then wait up to the shutdown timeout for
    /// in-flight jobs. Jobs still running after that are aborted and left
    /// active for stall recovery on the next start.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut next_sweep = Instant::now();
        info!(concurrency = self.config.concurrency, "worker pool started");

        loop {
            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "job task panicked");
                }
            }
            if cancel.is_cancelled() {
                break;
            }

            if Instant::now() >= next_sweep {
                self.sweep_stalled().await;
                next_sweep = Instant::now() + self.config.stalled_interval;
            }

            if self.is_paused() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.wake.notified() => {}
                    _ = sleep_until(next_sweep) => {}
                }
                continue;
            }

            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            // Paused while every permit was busy.
            if self.is_paused() {
                drop(permit);
                continue;
            }

            match self.store.claim_next().await {
                Ok(Some(claim)) => {
                    let pool = Arc::clone(&self);
                    tasks.spawn(async move {
                        let _permit = permit;
                        let event = pool.execute(claim).await;
                        pool.publish(event).await;
                    });
                    continue;
                }
                Ok(None) => drop(permit),
                Err(e) => {
                    drop(permit);
                    warn!(error = %e, "failed to claim next job");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = sleep(self.config.poll_interval) => {}
                _ = sleep_until(next_sweep) => {}
            }
        }

        info!(in_flight = tasks.len(), "worker pool draining");
        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "job task panicked");
                }
            }
        };
        if timeout(self.config.shutdown_timeout, drain).await.is_err() {
            warn!(
                remaining = tasks.len(),
                "shutdown timeout elapsed, abandoning in-flight jobs"
            );
            tasks.abort_all();
        }
        info!("worker pool stopped");
    }

    /// Stop claiming new jobs. Jobs already running finish normally.
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            metrics::gauge!("courier_queue_paused").set(1.0);
            info!("queue paused");
        }
    }

    /// Resume claiming jobs.
    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            metrics::gauge!("courier_queue_paused").set(0.0);
            info!("queue resumed");
        }
        self.wake.notify_one();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Wake the pool so a newly enqueued job is claimed without waiting
    /// for the next poll.
    pub fn notify(&self) {
        self.wake.notify_one();
    }

    /// Claim and process a single job inline, publishing its event.
    ///
    /// Returns `None` when paused or when nothing is eligible.
    pub async fn process_next(&self) -> Result<Option<JobEvent>, CourierError> {
        if self.is_paused() {
            return Ok(None);
        }
        let Some(claim) = self.store.claim_next().await? else {
            return Ok(None);
        };
        let event = self.execute(claim).await;
        self.publish(event.clone()).await;
        Ok(Some(event))
    }

    /// Recover stalled jobs and publish what happened to each.
    pub async fn sweep_stalled(&self) -> Vec<JobEvent> {
        let recovered = match self.store.recover_stalled().await {
            Ok(recovered) => recovered,
            Err(e) => {
                warn!(error = %e, "stalled job sweep failed");
                return Vec::new();
            }
        };

        let mut events = Vec::with_capacity(recovered.len());
        for recovery in recovered {
            let event = match recovery {
                StallRecovery::Requeued(job_id) => {
                    warn!(job_id = %job_id, "stalled job returned to queue");
                    metrics::counter!("courier_jobs_stalled_total", "action" => "requeued")
                        .increment(1);
                    JobEvent::Requeued { job_id }
                }
                StallRecovery::Failed(job) => {
                    warn!(job_id = %job.id, "stalled job failed");
                    metrics::counter!("courier_jobs_stalled_total", "action" => "failed")
                        .increment(1);
                    JobEvent::Failed(job)
                }
            };
            self.publish(event.clone()).await;
            events.push(event);
        }
        if !events.is_empty() {
            self.wake.notify_one();
        }
        events
    }

    async fn execute(&self, claim: ClaimedJob) -> JobEvent {
        debug!(job_id = %claim.id, attempt = claim.attempts, "dispatching job");
        let started = std::time::Instant::now();
        let result = self.dispatch(&claim).await;
        metrics::histogram!("courier_dispatch_latency_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(receipt) => self.settle_success(claim, receipt).await,
            Err(err) => self.settle_failure(claim, err).await,
        }
    }

    async fn dispatch(&self, claim: &ClaimedJob) -> Result<DispatchReceipt, CourierError> {
        let recipient = normalize_recipient(&claim.recipient)?;
        let body = normalize_body(&claim.body)?;
        self.dispatcher.send(&recipient, &body).await
    }

    async fn settle_success(&self, claim: ClaimedJob, receipt: DispatchReceipt) -> JobEvent {
        match self.store.complete(&claim, &receipt).await {
            Ok(Transition::Applied { at }) => {
                info!(
                    job_id = %claim.id,
                    attempts = claim.attempts,
                    message_id = %receipt.message_id,
                    "job completed"
                );
                JobEvent::Completed(claim.finish(at, Outcome::Success, Some(receipt), None))
            }
            Ok(Transition::Stale) => dropped(&claim, "claim superseded"),
            Err(e) => dropped(&claim, &e.to_string()),
        }
    }

    async fn settle_failure(&self, claim: ClaimedJob, err: CourierError) -> JobEvent {
        let message = err.to_string();
        match self.policy.decide(&err, claim.attempts, claim.max_attempts) {
            RetryDecision::Retry { delay_ms } => {
                let delay_until = self.clock.now_ms() + delay_ms as i64;
                match self.store.retry_later(&claim, delay_until, &message).await {
                    Ok(Transition::Applied { .. }) => {
                        warn!(
                            job_id = %claim.id,
                            attempts = claim.attempts,
                            max_attempts = claim.max_attempts,
                            delay_ms,
                            error = %message,
                            "dispatch failed, retrying"
                        );
                        JobEvent::Retrying {
                            job_id: claim.id,
                            attempts: claim.attempts,
                            delay_ms,
                            delay_until,
                            error: message,
                        }
                    }
                    Ok(Transition::Stale) => dropped(&claim, "claim superseded"),
                    Err(e) => dropped(&claim, &e.to_string()),
                }
            }
            RetryDecision::GiveUp => match self.store.fail(&claim, &message).await {
                Ok(Transition::Applied { at }) => {
                    error!(
                        job_id = %claim.id,
                        attempts = claim.attempts,
                        error = %message,
                        "job failed"
                    );
                    JobEvent::Failed(claim.finish(at, Outcome::Failure, None, Some(message)))
                }
                Ok(Transition::Stale) => dropped(&claim, "claim superseded"),
                Err(e) => dropped(&claim, &e.to_string()),
            },
        }
    }

    async fn publish(&self, event: JobEvent) {
        match &event {
            JobEvent::Completed(_) => {
                metrics::counter!("courier_jobs_finished_total", "outcome" => "success")
                    .increment(1);
            }
            JobEvent::Failed(_) => {
                metrics::counter!("courier_jobs_finished_total", "outcome" => "failure")
                    .increment(1);
            }
            JobEvent::Retrying { .. } => {
                metrics::counter!("courier_jobs_retried_total").increment(1);
            }
            JobEvent::Requeued { .. } => {}
            JobEvent::Dropped { .. } => return,
        }
        if self.events.send(event).await.is_err() {
            debug!("job event receiver closed");
        }
    }
}

fn dropped(claim: &ClaimedJob, reason: &str) -> JobEvent {
    warn!(job_id = %claim.id, reason = %reason, "job outcome not recorded");
    JobEvent::Dropped {
        job_id: claim.id.clone(),
        reason: reason.to_string(),
    }
}
