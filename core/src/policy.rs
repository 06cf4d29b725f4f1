//! Admission policy: pure validation, no I/O.
//!
//! Runs before the allocator. A rejection here never consumes a retry attempt
//! and never touches either store.

use crate::error::ValidationError;
use crate::types::{PartnerId, ReservationId, SeatCount};

/// Check that `raw` is non-empty after trimming.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyPartnerId`] for blank input.
pub fn validate_partner_id(raw: &str) -> Result<PartnerId, ValidationError> {
    PartnerId::try_from(raw.to_string())
}

/// Check that `seats` lies in `[1, 10]`.
///
/// # Errors
///
/// Returns [`ValidationError::SeatsOutOfRange`] otherwise.
///
/// # Examples
///
/// ```
/// use ticketboss_core::policy::validate_seats;
///
/// assert_eq!(validate_seats(4).map(|s| s.value()), Ok(4));
/// assert!(validate_seats(-1).is_err());
/// ```
pub fn validate_seats(seats: i64) -> Result<SeatCount, ValidationError> {
    u32::try_from(seats)
        .map_err(|_| ValidationError::SeatsOutOfRange { seats })
        .and_then(SeatCount::try_from)
}

/// Check that a cancellation handle is non-empty after trimming.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyReservationId`] for blank input.
pub fn validate_reservation_id(raw: &str) -> Result<ReservationId, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyReservationId);
    }
    Ok(ReservationId::new(trimmed))
}

/// Validate a reserve request, partner id first.
///
/// # Errors
///
/// The first failing check, see [`validate_partner_id`] and [`validate_seats`].
pub fn validate_reservation(
    partner_id: &str,
    seats: i64,
) -> Result<(PartnerId, SeatCount), ValidationError> {
    let partner_id = validate_partner_id(partner_id)?;
    let seats = validate_seats(seats)?;
    Ok((partner_id, seats))
}
