// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use courier_config::model::GatewayConfig;
use courier_core::CourierError;
use courier_engine::Courier;
use courier_prometheus::PrometheusAdapter;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub courier: Arc<Courier>,
    /// Present when the Prometheus recorder is installed.
    pub prometheus: Option<Arc<PrometheusAdapter>>,
    /// Required on `/v1` routes when set.
    pub bearer_token: Option<String>,
    /// Process start time for uptime calculation.
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(courier: Arc<Courier>) -> Self {
        Self {
            courier,
            prometheus: None,
            bearer_token: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_prometheus(mut self, prometheus: Arc<PrometheusAdapter>) -> Self {
        self.prometheus = Some(prometheus);
        self
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.is_empty());
        self
    }
}

/// Build the full application router.
///
/// `/health` and `/metrics` are public. Everything under `/v1` requires the
/// bearer token when one is configured.
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .with_state(state.clone());

    let mut api_routes = Router::new()
        .route("/v1/messages", post(handlers::post_messages))
        .route("/v1/messages/bulk", post(handlers::post_bulk))
        .route("/v1/jobs/{id}", get(handlers::get_job))
        .route("/v1/queue", get(handlers::get_queue))
        .route("/v1/queue/pause", post(handlers::pause_queue))
        .route("/v1/queue/resume", post(handlers::resume_queue))
        .route("/v1/logs", get(handlers::get_logs))
        .route("/v1/stats/daily/{date}", get(handlers::get_daily_stats))
        .route(
            "/v1/rate-limits/{identifier}",
            get(handlers::get_rate_limit).delete(handlers::delete_rate_limit),
        );

    if let Some(token) = state.bearer_token.clone() {
        api_routes = api_routes.route_layer(axum_middleware::from_fn_with_state(
            AuthConfig {
                bearer_token: token,
            },
            auth_middleware,
        ));
    }

    Router::new()
        .merge(public_routes)
        .merge(api_routes.with_state(state))
        .layer(CorsLayer::permissive())
}

/// Bind and serve the API until `cancel` fires.
pub async fn serve(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), CourierError> {
    if state.bearer_token.is_none() {
        tracing::warn!("gateway bearer_token is not set, /v1 routes are unauthenticated");
    }
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| CourierError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
