// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier dispatch engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional and defaults to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Admission control (sliding-window rate limiting).
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Job queue, retry policy, and worker pool.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Delivery log and daily statistics.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Outbound SMS gateway credentials.
    #[serde(default)]
    pub sms: SmsConfig,

    /// HTTP API settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Service identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name reported in logs and health output.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "courier".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("courier.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("courier.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Sliding-window admission control.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimiterConfig {
    /// Length of the trailing window in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Admitted requests allowed per identifier within one window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// How long an identifier stays blocked after exceeding the limit.
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
            block_ms: default_block_ms(),
        }
    }
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_requests() -> u32 {
    30
}

fn default_block_ms() -> u64 {
    300_000
}

/// Job queue, retry, and worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Attempt ceiling for every new job.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles on each further attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on any single retry delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Random spread applied to retry delays, as a fraction (0.0 - 1.0).
    #[serde(default)]
    pub backoff_jitter: f64,

    /// Maximum number of jobs dispatched concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// An active job older than this is considered stalled.
    #[serde(default = "default_stalled_interval_ms")]
    pub stalled_interval_ms: u64,

    /// Idle wait between claim attempts when the queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of completed jobs retained.
    #[serde(default = "default_keep_completed")]
    pub keep_completed: u32,

    /// Number of failed jobs retained.
    #[serde(default = "default_keep_failed")]
    pub keep_failed: u32,

    /// Priority assigned when a request does not specify one.
    #[serde(default)]
    pub default_priority: i64,

    /// Longest delay a request may ask for before its job becomes eligible.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Capacity of the job event channel feeding the outcome recorder.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// How long shutdown waits for in-flight jobs.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            backoff_jitter: 0.0,
            concurrency: default_concurrency(),
            stalled_interval_ms: default_stalled_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            keep_completed: default_keep_completed(),
            keep_failed: default_keep_failed(),
            default_priority: 0,
            max_delay_ms: default_max_delay_ms(),
            event_buffer: default_event_buffer(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    2_000
}

fn default_backoff_max_ms() -> u64 {
    3_600_000
}

fn default_concurrency() -> usize {
    5
}

fn default_stalled_interval_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_keep_completed() -> u32 {
    100
}

fn default_keep_failed() -> u32 {
    50
}

fn default_max_delay_ms() -> u64 {
    7 * 24 * 3_600_000
}

fn default_event_buffer() -> usize {
    1024
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

/// Delivery log and daily statistics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Maximum delivery log entries kept (newest first).
    #[serde(default = "default_log_capacity")]
    pub log_capacity: u32,

    /// Days of per-day counters kept.
    #[serde(default = "default_stats_retention_days")]
    pub stats_retention_days: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
            stats_retention_days: default_stats_retention_days(),
        }
    }
}

fn default_log_capacity() -> u32 {
    1_000
}

fn default_stats_retention_days() -> u32 {
    7
}

/// Twilio-compatible SMS gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmsConfig {
    /// API base URL.
    #[serde(default = "default_sms_base_url")]
    pub base_url: String,

    /// Account SID used in the request path and as the basic-auth user.
    #[serde(default)]
    pub account_sid: Option<String>,

    /// Auth token used as the basic-auth password.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Sender number every message is sent from.
    #[serde(default)]
    pub from_number: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_sms_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            base_url: default_sms_base_url(),
            account_sid: None,
            auth_token: None,
            from_number: None,
            timeout_secs: default_sms_timeout_secs(),
        }
    }
}

fn default_sms_base_url() -> String {
    "https://api.twilio.com".to_string()
}

fn default_sms_timeout_secs() -> u64 {
    30
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Serve the HTTP API.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on `/v1/*` routes. Unset leaves the API open.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

impl CourierConfig {
    /// A copy with credentials replaced by a placeholder, for display.
    pub fn redacted(&self) -> CourierConfig {
        let mut copy = self.clone();
        if copy.sms.auth_token.is_some() {
            copy.sms.auth_token = Some("[REDACTED]".to_string());
        }
        if copy.gateway.bearer_token.is_some() {
            copy.gateway.bearer_token = Some("[REDACTED]".to_string());
        }
        copy
    }
}
