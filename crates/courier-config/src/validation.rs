// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of stopping at the first.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.service.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::validation(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    let limiter = &config.limiter;
    for (name, value) in [
        ("limiter.window_ms", limiter.window_ms),
        ("limiter.block_ms", limiter.block_ms),
        ("limiter.max_requests", u64::from(limiter.max_requests)),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "{name} must be greater than zero"
            )));
        }
    }

    let queue = &config.queue;
    for (name, value) in [
        ("queue.max_attempts", u64::from(queue.max_attempts)),
        ("queue.concurrency", queue.concurrency as u64),
        ("queue.event_buffer", queue.event_buffer as u64),
        ("queue.stalled_interval_ms", queue.stalled_interval_ms),
        ("queue.poll_interval_ms", queue.poll_interval_ms),
        ("queue.max_delay_ms", queue.max_delay_ms),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "{name} must be greater than zero"
            )));
        }
    }

    if queue.backoff_base_ms > queue.backoff_max_ms {
        errors.push(ConfigError::validation(format!(
            "queue.backoff_base_ms ({}) must not exceed queue.backoff_max_ms ({})",
            queue.backoff_base_ms, queue.backoff_max_ms
        )));
    }

    if i64::try_from(queue.max_delay_ms).is_err() {
        errors.push(ConfigError::validation(format!(
            "queue.max_delay_ms must not exceed {}, got {}",
            i64::MAX,
            queue.max_delay_ms
        )));
    }

    if !(0.0..=1.0).contains(&queue.backoff_jitter) {
        errors.push(ConfigError::validation(format!(
            "queue.backoff_jitter must be between 0.0 and 1.0, got {}",
            queue.backoff_jitter
        )));
    }

    if config.ledger.log_capacity == 0 {
        errors.push(ConfigError::validation(
            "ledger.log_capacity must be greater than zero",
        ));
    }

    if config.sms.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "sms.timeout_secs must be greater than zero",
        ));
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    } else {
        let is_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_ip && !is_hostname {
            errors.push(ConfigError::validation(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if let Some(token) = &config.gateway.bearer_token
        && token.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "gateway.bearer_token must not be empty when set",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let mut config = CourierConfig::default();
        config.limiter.max_requests = 0;
        config.queue.concurrency = 0;
        config.queue.backoff_base_ms = 10_000;
        config.queue.backoff_max_ms = 1_000;
        config.queue.backoff_jitter = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn rejects_delay_ceiling_out_of_range() {
        let mut config = CourierConfig::default();
        config.queue.max_delay_ms = 0;
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);

        config.queue.max_delay_ms = u64::MAX;
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);
    }

    #[test]
    fn rejects_bad_host_and_log_level() {
        let mut config = CourierConfig::default();
        config.gateway.host = "not a host!".into();
        config.service.log_level = "loud".into();
        let errors = validate_config(&config).unwrap_err();
        let text: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert!(text.iter().any(|t| t.contains("gateway.host")));
        assert!(text.iter().any(|t| t.contains("service.log_level")));
    }

    #[test]
    fn accepts_ipv6_host() {
        let mut config = CourierConfig::default();
        config.gateway.host = "::1".into();
        assert!(validate_config(&config).is_ok());
    }
}
