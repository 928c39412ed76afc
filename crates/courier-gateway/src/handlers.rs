// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use courier_core::{CourierError, HealthStatus};
use courier_engine::{BulkItemResult, BulkRequest, SendRequest};

use crate::server::GatewayState;

/// Default page size for `GET /v1/logs`.
pub const DEFAULT_LOG_LIMIT: u32 = 50;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// Engine errors rendered as HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub CourierError);

impl From<CourierError> for ApiError {
    fn from(e: CourierError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CourierError::Validation(_) => StatusCode::BAD_REQUEST,
            CourierError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            CourierError::NotFound(_) => StatusCode::NOT_FOUND,
            CourierError::Storage { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let mut response = (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response();

        if let CourierError::RateLimited {
            reset_at,
            retry_after_ms,
            ..
        } = &self.0
        {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(ceil_secs(*retry_after_ms)));
            headers.insert("x-ratelimit-reset", HeaderValue::from(ceil_secs(*reset_at)));
        }
        response
    }
}

/// Milliseconds to whole seconds, rounding up.
fn ceil_secs(ms: i64) -> i64 {
    (ms.max(0) + 999) / 1000
}

/// Response body for POST /v1/messages.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub position: u64,
}

/// POST /v1/messages
pub async fn post_messages(
    State(state): State<GatewayState>,
    Json(body): Json<SendRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let enqueued = state.courier.submit(body).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id: enqueued.job_id.0,
            position: enqueued.position,
        }),
    ))
}

/// Response body for POST /v1/messages/bulk.
#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub results: Vec<BulkItemResult>,
    pub accepted: usize,
    pub rejected: usize,
}

/// POST /v1/messages/bulk
///
/// Items are admitted independently; per-item failures never fail the batch.
pub async fn post_bulk(
    State(state): State<GatewayState>,
    Json(body): Json<BulkRequest>,
) -> Json<BulkResponse> {
    let results = state.courier.submit_bulk(body).await;
    let accepted = results.iter().filter(|r| r.is_accepted()).count();
    Json(BulkResponse {
        rejected: results.len() - accepted,
        accepted,
        results,
    })
}

/// GET /v1/jobs/{id}
pub async fn get_job(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let view = state.courier.job_status(&id).await?;
    Ok(Json(view).into_response())
}

/// GET /v1/queue
pub async fn get_queue(State(state): State<GatewayState>) -> Result<Response, ApiError> {
    let stats = state.courier.queue_stats().await?;
    Ok(Json(stats).into_response())
}

/// POST /v1/queue/pause
pub async fn pause_queue(State(state): State<GatewayState>) -> Result<Response, ApiError> {
    state.courier.pause();
    get_queue(State(state)).await
}

/// POST /v1/queue/resume
pub async fn resume_queue(State(state): State<GatewayState>) -> Result<Response, ApiError> {
    state.courier.resume();
    get_queue(State(state)).await
}

/// Query parameters for GET /v1/logs.
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

/// GET /v1/logs
pub async fn get_logs(
    State(state): State<GatewayState>,
    Query(query): Query<LogsQuery>,
) -> Result<Response, ApiError> {
    let entries = state
        .courier
        .logs(
            query.limit.unwrap_or(DEFAULT_LOG_LIMIT),
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(entries).into_response())
}

/// GET /v1/stats/daily/{date}
pub async fn get_daily_stats(
    State(state): State<GatewayState>,
    Path(date): Path<String>,
) -> Result<Response, ApiError> {
    let stats = state.courier.daily_stats(&date).await?;
    Ok(Json(stats).into_response())
}

/// GET /v1/rate-limits/{identifier}
pub async fn get_rate_limit(
    State(state): State<GatewayState>,
    Path(identifier): Path<String>,
) -> Result<Response, ApiError> {
    let decision = state.courier.rate_limit_status(&identifier).await?;
    Ok(Json(decision).into_response())
}

/// Response body for DELETE /v1/rate-limits/{identifier}.
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
}

/// DELETE /v1/rate-limits/{identifier}
pub async fn delete_rate_limit(
    State(state): State<GatewayState>,
    Path(identifier): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let success = state.courier.reset_rate_limit(&identifier).await?;
    Ok(Json(ResetResponse { success }))
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub storage: String,
    pub dispatcher: String,
}

fn describe(status: &HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => "healthy".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
        HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
    }
}

/// GET /health
///
/// Unauthenticated. Returns 503 when storage is unhealthy.
pub async fn get_public_health(State(state): State<GatewayState>) -> Response {
    let report = state.courier.health().await;
    let overall = report.overall();
    let code = match overall {
        HealthStatus::Unhealthy(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    let status = match overall {
        HealthStatus::Healthy => "healthy",
        HealthStatus::Degraded(_) => "degraded",
        HealthStatus::Unhealthy(_) => "unhealthy",
    };
    let body = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        storage: describe(&report.storage),
        dispatcher: describe(&report.dispatcher),
    };
    (code, Json(body)).into_response()
}

/// GET /metrics
///
/// Unauthenticated Prometheus text exposition; 404 when metrics are disabled.
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.prometheus {
        Some(prometheus) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            prometheus.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_mapping() {
        let cases = [
            (CourierError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (CourierError::NotFound("job".into()), StatusCode::NOT_FOUND),
            (CourierError::storage("locked"), StatusCode::SERVICE_UNAVAILABLE),
            (CourierError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).into_response().status(), expected);
        }
    }

    #[test]
    fn rate_limited_sets_headers() {
        let response = ApiError(CourierError::RateLimited {
            identifier: "tenant".into(),
            reset_at: 1_705_313_100_000,
            retry_after_ms: 299_001,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "300");
        assert_eq!(response.headers()["x-ratelimit-reset"], "1705313100");
    }

    #[test]
    fn ceil_secs_rounds_up() {
        assert_eq!(ceil_secs(0), 0);
        assert_eq!(ceil_secs(1), 1);
        assert_eq!(ceil_secs(1_000), 1);
        assert_eq!(ceil_secs(-5), 0);
    }

    #[test]
    fn logs_query_defaults() {
        let q: LogsQuery = serde_json::from_str("{}").unwrap();
        assert!(q.limit.is_none());
        assert!(q.offset.is_none());
    }
}
