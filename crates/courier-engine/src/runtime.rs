// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background tasks: the worker pool, the event consumer, and periodic
//! maintenance.

use std::sync::Arc;
use std::time::Duration;

use courier_core::CourierError;
use courier_ledger::OutcomeRecorder;
use courier_queue::JobEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::courier::Courier;

/// How often expired rate-limit rows are purged and gauges refreshed.
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(15);

/// Handles of the engine's background tasks.
pub struct EngineHandle {
    pool: JoinHandle<()>,
    consumer: JoinHandle<()>,
    maintenance: JoinHandle<()>,
    consumer_stop: CancellationToken,
}

impl EngineHandle {
    /// Wait for the pool to drain, then for the consumer to record every
    /// outstanding event, then for maintenance to stop.
    ///
    /// Returns once the cancellation token passed to [`Courier::start`] has
    /// fired and all tasks have finished.
    pub async fn wait(self) {
        if let Err(e) = self.pool.await {
            error!(error = %e, "worker pool task failed");
        }
        self.consumer_stop.cancel();
        if let Err(e) = self.consumer.await {
            error!(error = %e, "event consumer task failed");
        }
        if let Err(e) = self.maintenance.await {
            error!(error = %e, "maintenance task failed");
        }
        info!("engine stopped");
    }
}

impl Courier {
    /// Start the worker pool, event consumer, and maintenance loop.
    ///
    /// Can only be called once per engine.
    pub async fn start(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> Result<EngineHandle, CourierError> {
        let rx = self
            .events
            .lock()
            .await
            .take()
            .ok_or_else(|| CourierError::Internal("engine already started".into()))?;

        let pool = tokio::spawn(Arc::clone(&self.pool).run(cancel.clone()));

        let consumer_stop = CancellationToken::new();
        let consumer = tokio::spawn(consume_events(
            Arc::clone(&self.recorder),
            rx,
            consumer_stop.clone(),
        ));

        let engine = Arc::clone(self);
        let maintenance = tokio::spawn(async move {
            engine.maintenance_loop(cancel).await;
        });

        info!("engine started");
        Ok(EngineHandle {
            pool,
            consumer,
            maintenance,
            consumer_stop,
        })
    }

    async fn maintenance_loop(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => self.run_maintenance().await,
                _ = cancel.cancelled() => {
                    debug!("maintenance loop shutting down");
                    break;
                }
            }
        }
    }

    /// Purge expired rate-limit rows and refresh queue gauges.
    pub async fn run_maintenance(&self) {
        if let Err(e) = self.limiter.purge_expired().await {
            warn!(error = %e, "rate limit purge failed");
        }
        match self.store.counts().await {
            Ok(counts) => {
                courier_prometheus::set_queue_depth("waiting", counts.waiting);
                courier_prometheus::set_queue_depth("delayed", counts.delayed);
                courier_prometheus::set_queue_depth("active", counts.active);
                courier_prometheus::set_queue_depth("completed", counts.completed);
                courier_prometheus::set_queue_depth("failed", counts.failed);
            }
            Err(e) => warn!(error = %e, "queue depth refresh failed"),
        }
        courier_prometheus::set_queue_paused(self.pool.is_paused());
    }
}

async fn consume_events(
    recorder: Arc<OutcomeRecorder>,
    mut rx: mpsc::Receiver<JobEvent>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(event) => apply_event(&recorder, event).await,
                None => break,
            },
            _ = stop.cancelled() => {
                while let Ok(event) = rx.try_recv() {
                    apply_event(&recorder, event).await;
                }
                break;
            }
        }
    }
    debug!("event consumer stopped");
}

/// Record terminal events in the ledger.
pub(crate) async fn apply_event(recorder: &OutcomeRecorder, event: JobEvent) {
    match event.finished() {
        Some(job) => recorder.record(job).await,
        None => debug!(job_id = %event.job_id(), event = event.label(), "job event"),
    }
}
