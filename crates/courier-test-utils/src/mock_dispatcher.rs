// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock dispatch adapter for deterministic testing.
//!
//! `MockDispatcher` implements `DispatchAdapter` with scripted results,
//! captured sends, and peak in-flight tracking for concurrency assertions.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::{
    AdapterType, CourierError, DispatchAdapter, DispatchReceipt, HealthStatus, PluginAdapter,
};

/// A scripted result for one `send` call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResult {
    /// Accepted with this cost.
    Accept { cost: Option<f64> },
    /// Retryable gateway failure with this HTTP status.
    Transient(u16),
    /// Non-retryable rejection.
    Reject(String),
}

/// A message passed to `send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: String,
    pub body: String,
}

/// A mock SMS gateway.
///
/// Results are popped from a FIFO script. When the script is empty the
/// fallback result is used (acceptance unless changed).
pub struct MockDispatcher {
    script: Arc<Mutex<VecDeque<MockResult>>>,
    fallback: Arc<Mutex<MockResult>>,
    sent: Arc<Mutex<Vec<SentMessage>>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl MockDispatcher {
    /// Create a dispatcher that accepts everything.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(MockResult::Accept { cost: None })),
            sent: Arc::new(Mutex::new(Vec::new())),
            latency: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every `send`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Append results to the script.
    pub async fn push_results(&self, results: impl IntoIterator<Item = MockResult>) {
        self.script.lock().await.extend(results);
    }

    /// Result used once the script is exhausted.
    pub async fn set_fallback(&self, result: MockResult) {
        *self.fallback.lock().await = result;
    }

    /// Messages that reached `send`, in call order.
    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Number of `send` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent `send` calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn next_result(&self) -> MockResult {
        match self.script.lock().await.pop_front() {
            Some(result) => result,
            None => self.fallback.lock().await.clone(),
        }
    }
}

impl Default for MockDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockDispatcher {
    fn name(&self) -> &str {
        "mock-dispatcher"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Dispatch
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

#[async_trait]
impl DispatchAdapter for MockDispatcher {
    async fn send(&self, recipient: &str, body: &str) -> Result<DispatchReceipt, CourierError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        self.sent.lock().await.push(SentMessage {
            recipient: recipient.to_string(),
            body: body.to_string(),
        });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let result = self.next_result().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match result {
            MockResult::Accept { cost } => Ok(DispatchReceipt {
                message_id: format!("mock-{call}"),
                status: "queued".to_string(),
                cost,
            }),
            MockResult::Transient(status) => Err(CourierError::dispatch(
                format!("gateway returned {status}"),
                Some(status),
            )),
            MockResult::Reject(message) => Err(CourierError::Validation(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn follows_script_then_fallback() {
        let mock = MockDispatcher::new();
        mock.push_results([MockResult::Transient(503), MockResult::Reject("bad".into())])
            .await;

        let first = mock.send("+1", "a").await.unwrap_err();
        assert!(first.is_retryable());
        let second = mock.send("+1", "b").await.unwrap_err();
        assert!(!second.is_retryable());
        let third = mock.send("+1", "c").await.unwrap();
        assert_eq!(third.message_id, "mock-3");

        mock.set_fallback(MockResult::Transient(500)).await;
        assert!(mock.send("+1", "d").await.is_err());

        assert_eq!(mock.call_count(), 4);
        let bodies: Vec<String> = mock
            .sent_messages()
            .await
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(bodies, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn tracks_peak_concurrency() {
        let mock = Arc::new(MockDispatcher::new().with_latency(Duration::from_millis(20)));
        let mut handles = Vec::new();
        for _ in 0..3 {
            let mock = mock.clone();
            handles.push(tokio::spawn(async move { mock.send("+1", "x").await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert!(mock.peak_in_flight() >= 1);
        assert!(mock.peak_in_flight() <= 3);
    }
}
