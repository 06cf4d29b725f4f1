//! Router configuration.

use crate::{
    error::AppError,
    handlers::{cancel_reservation, event_summary, health_check, metrics, reserve_seats},
    middleware::request_id,
    state::AppState,
};
use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Routes:
/// - `GET /reservations`, `POST /reservations`
/// - `DELETE /reservations/:reservation_id`
/// - `GET /health`, `GET /metrics`
///
/// Anything else answers 404 `NOT_FOUND` in the usual error shape.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/reservations", get(event_summary).post(reserve_seats))
        .route("/reservations/:reservation_id", delete(cancel_reservation))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id))
        .with_state(state)
}

#[allow(clippy::unused_async)]
async fn not_found() -> AppError {
    AppError::not_found("Route not found")
}
