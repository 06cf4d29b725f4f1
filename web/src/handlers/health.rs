//! Health and metrics endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::{error::AppError, state::AppState};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

/// Liveness response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Simple health check endpoint (for basic liveness).
///
/// Does NOT check dependencies (database, etc.).
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// { "status": "ok", "version": "0.1.0" }
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Prometheus scrape endpoint.
///
/// # Errors
///
/// 404 when no recorder was installed by this process.
#[allow(clippy::unused_async)]
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .ok_or_else(|| AppError::not_found("Metrics are disabled"))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
