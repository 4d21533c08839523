// Request middleware: bearer authentication and HTTP metrics

use crate::api::routes::AppState;
use crate::errors::{AppError, Result};
use crate::observability::MetricsRecorder;
use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;

const BEARER: &str = "Bearer ";

/// Pull the token out of `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = value
        .strip_prefix(BEARER)
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .ok_or(AppError::Unauthorized)?;

    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }
    Ok(token)
}

/// Resolve the bearer token to a user and attach it to the request.
/// Handlers behind this layer read it with `Extension<User>`.
pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(req.headers())?;
    let user = state.services.credentials.resolve_user(token).await?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Count requests and record latency per matched route
pub async fn track_metrics(req: Request, next: Next) -> impl IntoResponse {
    let start = Instant::now();
    let path = match req.extensions().get::<MatchedPath>() {
        Some(matched_path) => matched_path.as_str().to_owned(),
        None => "unmatched".to_owned(),
    };
    let method = req.method().clone();

    let response = next.run(req).await;

    let latency = start.elapsed().as_secs_f64();
    MetricsRecorder::record_http_request(method.as_str(), &path, response.status().as_u16());
    MetricsRecorder::record_http_duration(method.as_str(), &path, latency);

    response
}
