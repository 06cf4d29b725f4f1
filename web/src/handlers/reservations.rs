//! Reservation API endpoints.
//!
//! - `GET /reservations` - event summary
//! - `POST /reservations` - reserve seats for a partner
//! - `DELETE /reservations/:reservation_id` - cancel a reservation
//!
//! Handlers only translate JSON to allocator calls; validation, retries and
//! compensation all live in [`ticketboss_runtime::SeatAllocator`].

use crate::{error::AppError, state::AppState, WebResult};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ticketboss_core::{
    policy, CancelOutcome, EventSummary, ReservationConfirmation, ReservationStatus,
    ValidationError,
};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /reservations`.
///
/// Fields are kept untyped so that a wrong type is reported as a
/// `VALIDATION_ERROR` naming the field rather than a generic parse failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    /// Requesting partner
    #[serde(default)]
    pub partner_id: Option<Value>,
    /// Seats wanted, integer in `[1, 10]`
    #[serde(default)]
    pub seats: Option<Value>,
}

/// Response after a confirmed reservation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReserveResponse {
    /// Handle for cancellation
    pub reservation_id: String,
    /// Seats granted
    pub seats: u32,
    /// Always `confirmed`
    pub status: ReservationStatus,
}

impl From<ReservationConfirmation> for ReserveResponse {
    fn from(confirmation: ReservationConfirmation) -> Self {
        Self {
            reservation_id: confirmation.reservation_id.as_str().to_string(),
            seats: confirmation.seats.value(),
            status: confirmation.status,
        }
    }
}

/// Event summary response.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    /// Event identifier
    pub event_id: String,
    /// Display name
    pub name: String,
    /// Capacity
    pub total_seats: u32,
    /// Seats still available
    pub available_seats: u32,
    /// Active reservations
    pub reservation_count: u64,
    /// Current version
    pub version: u64,
}

impl From<EventSummary> for SummaryResponse {
    fn from(summary: EventSummary) -> Self {
        Self {
            event_id: summary.event_id.as_str().to_string(),
            name: summary.name,
            total_seats: summary.total_seats,
            available_seats: summary.available_seats,
            reservation_count: summary.reservation_count,
            version: summary.version.value(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Summary of the managed event.
///
/// # Example
///
/// ```bash
/// curl http://localhost:3000/reservations
/// ```
///
/// Response:
/// ```json
/// {
///   "eventId": "node-meetup-2025",
///   "name": "Node.js Meet-up",
///   "totalSeats": 500,
///   "availableSeats": 497,
///   "reservationCount": 1,
///   "version": 1
/// }
/// ```
///
/// # Errors
///
/// 500 when the event record is missing or the store fails.
pub async fn event_summary(
    State(state): State<AppState>,
) -> WebResult<Json<SummaryResponse>> {
    let summary = state.allocator.event_summary().await?;
    Ok(Json(summary.into()))
}

/// Reserve seats.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:3000/reservations \
///   -H "Content-Type: application/json" \
///   -d '{"partnerId": "abc-corp", "seats": 3}'
/// ```
///
/// Response (201):
/// ```json
/// { "reservationId": "0b6c...", "seats": 3, "status": "confirmed" }
/// ```
///
/// # Errors
///
/// - 400 `VALIDATION_ERROR`: malformed body, blank partner, seats not an
///   integer in `[1, 10]`
/// - 409 `INSUFFICIENT_SEATS` / `CONCURRENCY_CONFLICT`
/// - 500 for store faults
pub async fn reserve_seats(
    State(state): State<AppState>,
    body: Result<Json<ReserveRequest>, JsonRejection>,
) -> WebResult<(StatusCode, Json<ReserveResponse>)> {
    let Json(request) = body?;

    let partner_id = request
        .partner_id
        .as_ref()
        .and_then(Value::as_str)
        .unwrap_or_default();
    let partner_id = policy::validate_partner_id(partner_id)?;

    let seats = request
        .seats
        .as_ref()
        .and_then(Value::as_i64)
        .ok_or(ValidationError::SeatsNotInteger)?;
    let seats = policy::validate_seats(seats)?;

    let confirmation = state.allocator.reserve(partner_id, seats).await?;

    Ok((StatusCode::CREATED, Json(confirmation.into())))
}

/// Cancel a reservation.
///
/// # Example
///
/// ```bash
/// curl -X DELETE http://localhost:3000/reservations/0b6c...
/// ```
///
/// # Errors
///
/// - 404 `NOT_FOUND`: unknown or already cancelled
/// - 409 `CONCURRENCY_CONFLICT`
/// - 500 for store faults
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<String>,
) -> WebResult<StatusCode> {
    match state.allocator.cancel_reservation(&reservation_id).await? {
        CancelOutcome::Cancelled => Ok(StatusCode::NO_CONTENT),
        CancelOutcome::NotFound => Err(AppError::not_found(format!(
            "Reservation {} not found",
            reservation_id.trim()
        ))),
    }
}
