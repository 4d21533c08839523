use crate::api::routes::AppState;
use crate::observability::{HealthChecker, MetricsRecorder};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

/// GET / - Service banner
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "message": "Incident desk API is running",
    }))
}

/// GET /health/live - Liveness probe
#[tracing::instrument(skip(health_checker))]
pub async fn liveness(
    State(health_checker): State<Arc<HealthChecker>>,
) -> impl IntoResponse {
    let status = health_checker.liveness().await;
    Json(status)
}

/// GET /health/ready - Readiness probe
#[tracing::instrument(skip(health_checker))]
pub async fn readiness(
    State(health_checker): State<Arc<HealthChecker>>,
) -> Result<impl IntoResponse, StatusCode> {
    let status = health_checker.readiness().await;

    if status.status == "ok" {
        Ok(Json(status))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// GET /metrics - Prometheus metrics
pub async fn metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    if !state.metrics_enabled {
        return Err(StatusCode::NOT_FOUND);
    }
    MetricsRecorder::export().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
