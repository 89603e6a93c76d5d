//! Liveness and readiness probes.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::state::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: String,
    pub destination: String,
    pub dispatch: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Process is running"))
)]
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "alive" })))
}

/// Ready when the destination bucket answers within the timeout.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready", body = ReadinessResponse),
        (status = 503, description = "Destination bucket unreachable", body = ReadinessResponse)
    )
)]
pub async fn readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let destination = match tokio::time::timeout(CHECK_TIMEOUT, state.destination.check()).await {
        Ok(Ok(())) => "ready".to_string(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, bucket = %state.destination.bucket(), "Destination readiness check failed");
            format!("not_ready: {}", e)
        }
        Err(_) => {
            tracing::error!(bucket = %state.destination.bucket(), "Destination readiness check timed out");
            "timeout".to_string()
        }
    };

    let ready = destination == "ready";
    let response = ReadinessResponse {
        status: if ready { "ready" } else { "not_ready" }.to_string(),
        destination,
        dispatch: if state.dispatcher.is_some() {
            "enabled"
        } else {
            "disabled"
        }
        .to_string(),
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
