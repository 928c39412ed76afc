// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Courier configuration system.

use courier_config::diagnostic::ConfigError;
use courier_config::{load_and_validate_str, load_config, load_config_from_str};
use serial_test::serial;

/// Valid TOML with every section deserializes.
#[test]
fn full_toml_deserializes() {
    let toml = r#"
[service]
name = "courier-test"
log_level = "debug"

[storage]
database_path = "/tmp/courier-test.db"
wal_mode = false

[limiter]
window_ms = 1000
max_requests = 3
block_ms = 5000

[queue]
max_attempts = 5
backoff_base_ms = 100
backoff_max_ms = 1000
backoff_jitter = 0.1
concurrency = 2
stalled_interval_ms = 10000
poll_interval_ms = 50
keep_completed = 10
keep_failed = 5
default_priority = 3
event_buffer = 16
shutdown_timeout_secs = 5

[ledger]
log_capacity = 20
stats_retention_days = 3

[sms]
base_url = "http://localhost:9999"
account_sid = "AC123"
auth_token = "secret"
from_number = "+15550001111"
timeout_secs = 5

[gateway]
enabled = false
host = "0.0.0.0"
port = 8080
bearer_token = "tok"

[prometheus]
enabled = false
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should load");
    assert_eq!(config.service.name, "courier-test");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.limiter.max_requests, 3);
    assert_eq!(config.queue.max_attempts, 5);
    assert_eq!(config.queue.default_priority, 3);
    assert_eq!(config.ledger.stats_retention_days, 3);
    assert_eq!(config.sms.account_sid.as_deref(), Some("AC123"));
    assert_eq!(config.gateway.port, 8080);
    assert!(!config.prometheus.enabled);
}

/// An empty document yields the compiled defaults.
#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty TOML is valid");
    assert_eq!(config.limiter.window_ms, 60_000);
    assert_eq!(config.queue.concurrency, 5);
    assert!(config.sms.account_sid.is_none());
}

/// A typo in a known section is reported with a suggestion and a span.
#[test]
fn unknown_key_gets_suggestion() {
    let toml = "[limiter]\nmax_reqests = 10\n";
    let errors = load_and_validate_str(toml).expect_err("typo must be rejected");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            ..
        } => {
            assert_eq!(key, "max_reqests");
            assert_eq!(suggestion.as_deref(), Some("max_requests"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Wrong value types surface as InvalidType.
#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[queue]\nconcurrency = \"many\"\n")
        .expect_err("string for integer must fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("concurrency"))),
        "got {errors:?}"
    );
}

/// Semantically invalid values pass deserialization but fail validation.
#[test]
fn semantic_errors_are_collected() {
    let errors = load_and_validate_str("[limiter]\nwindow_ms = 0\n[queue]\nmax_attempts = 0\n")
        .expect_err("zero values must fail");
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
}

/// Environment variables override file values, section-first.
#[test]
#[serial]
fn env_overrides_file() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "courier.toml",
            "[limiter]\nmax_requests = 10\n[queue]\nconcurrency = 2\n",
        )?;
        jail.set_env("COURIER_LIMITER_MAX_REQUESTS", "7");
        jail.set_env("COURIER_GATEWAY_BEARER_TOKEN", "from-env");

        let config = load_config()?;
        assert_eq!(config.limiter.max_requests, 7);
        assert_eq!(config.queue.concurrency, 2);
        assert_eq!(config.gateway.bearer_token.as_deref(), Some("from-env"));
        Ok(())
    });
}

/// Upper-case env names reach nested keys that contain underscores.
#[test]
#[serial]
fn env_alone_sets_underscored_keys() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("COURIER_QUEUE_BACKOFF_BASE_MS", "250");
        jail.set_env("COURIER_SERVICE_LOG_LEVEL", "debug");

        let config = load_config()?;
        assert_eq!(config.queue.backoff_base_ms, 250);
        assert_eq!(config.service.log_level, "debug");
        assert_eq!(config.limiter.max_requests, 30);
        Ok(())
    });
}

/// Unknown environment variables under the prefix are rejected like unknown keys.
#[test]
#[serial]
fn unknown_env_key_is_rejected() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("COURIER_QUEUE_CONCURENCY", "3");
        assert!(load_config().is_err());
        Ok(())
    });
}
