//! Health check handlers and response types.

use crate::state::AppState;
use axum::{http::StatusCode, response::IntoResponse, Json};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns status string "healthy", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct HealthCheckResponse {
    pub status: String,
    pub repository: String,
    pub storage: String,
    pub workers: usize,
}

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Readiness probe - the repository must answer.
pub async fn readiness_check(state: Arc<AppState>) -> impl IntoResponse {
    let repository = state.repository.clone();
    let result = run_check(
        CHECK_TIMEOUT,
        async move { repository.health_check().await },
        "not_ready",
    )
    .await;

    let ready = result == "healthy";
    if !ready {
        tracing::error!(repository = %result, "Readiness check failed");
    }

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = serde_json::json!({
        "status": if ready { "ready" } else { "not_ready" },
        "repository": if ready { "ready".to_string() } else { result },
    });

    (status_code, Json(body))
}

/// Full health check: repository and storage. A storage failure only degrades.
pub async fn health_check(state: Arc<AppState>) -> impl IntoResponse {
    let repository = state.repository.clone();
    let repository_status = run_check(
        CHECK_TIMEOUT,
        async move { repository.health_check().await },
        "unhealthy",
    )
    .await;

    let storage = state.storage.clone();
    let storage_status = run_check(
        CHECK_TIMEOUT,
        async move {
            storage
                .exists("health-check-non-existent-key")
                .await
                .map(drop)
        },
        "degraded",
    )
    .await;

    let healthy = repository_status == "healthy";
    let status = match (healthy, storage_status == "healthy") {
        (true, true) => "healthy",
        (true, false) => "degraded",
        (false, _) => "unhealthy",
    };

    let response = HealthCheckResponse {
        status: status.to_string(),
        repository: repository_status,
        storage: storage_status,
        workers: state.worker_count().await,
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
