// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine tests.
//!
//! `TestHarness` assembles a complete engine over an in-memory SQLite
//! database, a [`MockDispatcher`], and a [`ManualClock`], so tests drive
//! time and gateway behavior explicitly.

use std::sync::Arc;

use courier_config::CourierConfig;
use courier_core::{CourierError, ManualClock};
use courier_engine::{Courier, SendRequest};
use courier_storage::Database;

use crate::mock_dispatcher::MockDispatcher;

/// 2024-01-15T10:00:00Z.
pub const DEFAULT_START_MS: i64 = 1_705_312_800_000;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: CourierConfig,
    dispatcher: Option<MockDispatcher>,
    start_ms: i64,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: CourierConfig::default(),
            dispatcher: None,
            start_ms: DEFAULT_START_MS,
        }
    }

    /// Adjust the engine configuration.
    pub fn with_config(mut self, edit: impl FnOnce(&mut CourierConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Use a preconfigured mock dispatcher.
    pub fn with_dispatcher(mut self, dispatcher: MockDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Start the manual clock at this epoch-millis instant.
    pub fn starting_at(mut self, start_ms: i64) -> Self {
        self.start_ms = start_ms;
        self
    }

    /// Build the engine and its collaborators.
    pub async fn build(self) -> Result<TestHarness, CourierError> {
        let db = Database::open_in_memory().await?;
        let clock = Arc::new(ManualClock::new(self.start_ms));
        let dispatcher = Arc::new(self.dispatcher.unwrap_or_default());
        let courier = Arc::new(Courier::new(
            &self.config,
            db.clone(),
            dispatcher.clone(),
            clock.clone(),
        ));
        Ok(TestHarness {
            courier,
            dispatcher,
            clock,
            db,
            config: self.config,
        })
    }
}

/// A complete engine with mock adapters and an in-memory store.
pub struct TestHarness {
    pub courier: Arc<Courier>,
    pub dispatcher: Arc<MockDispatcher>,
    pub clock: Arc<ManualClock>,
    pub db: Database,
    pub config: CourierConfig,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default configuration.
    pub async fn new() -> Result<Self, CourierError> {
        Self::builder().build().await
    }

    /// A valid request for `identifier` with a distinct recipient per `n`.
    pub fn request(identifier: &str, n: u32) -> SendRequest {
        SendRequest::new(
            format!("+1555{:07}", n),
            format!("test message {n}"),
            identifier,
        )
    }

    /// Process jobs inline until nothing is eligible. Returns how many ran.
    pub async fn drain(&self) -> Result<usize, CourierError> {
        let mut processed = 0;
        while self.courier.process_next().await?.is_some() {
            processed += 1;
        }
        Ok(processed)
    }
}
