// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Opens the database, builds the SMS gateway adapter and the engine, starts
//! the worker pool and maintenance tasks, and serves the HTTP API until a
//! shutdown signal arrives.

use std::sync::Arc;

use courier_config::CourierConfig;
use courier_core::{CourierError, DispatchAdapter, SystemClock};
use courier_engine::Courier;
use courier_gateway::GatewayState;
use courier_prometheus::PrometheusAdapter;
use courier_sms::HttpSmsGateway;
use courier_storage::Database;
use tracing::{error, info};

use crate::shutdown;

/// Crates whose targets follow `service.log_level`.
const COURIER_TARGETS: &[&str] = &[
    "courier",
    "courier_core",
    "courier_config",
    "courier_storage",
    "courier_limiter",
    "courier_queue",
    "courier_ledger",
    "courier_sms",
    "courier_prometheus",
    "courier_engine",
    "courier_gateway",
];

/// Runs the `courier serve` command.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.service.log_level);

    info!(name = %config.service.name, "starting courier serve");

    let prometheus = if config.prometheus.enabled {
        Some(Arc::new(PrometheusAdapter::new()?))
    } else {
        None
    };

    let db = Database::from_config(&config.storage).await?;
    let dispatcher: Arc<dyn DispatchAdapter> = Arc::new(HttpSmsGateway::new(&config.sms)?);
    let courier = Arc::new(Courier::new(
        &config,
        db,
        dispatcher,
        Arc::new(SystemClock),
    ));

    let cancel = shutdown::install_signal_handler();
    let engine = courier.start(cancel.clone()).await?;

    let gateway = if config.gateway.enabled {
        let mut state = GatewayState::new(courier.clone())
            .with_bearer_token(config.gateway.bearer_token.clone());
        if let Some(prometheus) = &prometheus {
            state = state.with_prometheus(prometheus.clone());
        }
        let gateway_config = config.gateway.clone();
        let token = cancel.clone();
        Some(tokio::spawn(async move {
            let result = courier_gateway::serve(&gateway_config, state, token.clone()).await;
            if let Err(e) = &result {
                error!(error = %e, "gateway failed, shutting down");
                token.cancel();
            }
            result
        }))
    } else {
        info!("gateway disabled, running dispatch engine only");
        None
    };

    engine.wait().await;

    let mut outcome = Ok(());
    if let Some(handle) = gateway {
        match handle.await {
            Ok(result) => outcome = result,
            Err(e) => error!(error = %e, "gateway task panicked"),
        }
    }

    courier.shutdown().await?;
    info!("courier stopped");
    outcome
}

/// EnvFilter directive: `service.log_level` for courier crates, `warn` for
/// everything else.
fn filter_directive(log_level: &str) -> String {
    let mut directive: Vec<String> = COURIER_TARGETS
        .iter()
        .map(|target| format!("{target}={log_level}"))
        .collect();
    directive.push("warn".to_string());
    directive.join(",")
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_covers_every_crate_and_defaults_to_warn() {
        let directive = filter_directive("debug");
        assert!(directive.starts_with("courier=debug,"));
        assert!(directive.contains("courier_queue=debug"));
        assert!(directive.ends_with(",warn"));
        assert!(tracing_subscriber::EnvFilter::try_new(&directive).is_ok());
    }
}
