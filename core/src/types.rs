//! Domain types for the seat inventory.
//!
//! Identifiers are newtypes so an event id can never be passed where a
//! reservation id is expected. Seat counts and partner ids can only be built
//! through the admission checks in [`crate::policy`] (or their `TryFrom`
//! impls, which run the same checks), so a `SeatCount` in hand is always in
//! `[1, 10]`.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of the single inventory resource (the event).
///
/// # Examples
///
/// ```
/// use ticketboss_core::types::EventId;
///
/// let id = EventId::new("node-meetup-2025");
/// assert_eq!(id.as_str(), "node-meetup-2025");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    /// Create an `EventId` from trusted, application-controlled input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// External handle of a reservation.
///
/// Generated by the allocator (UUID v4 text), never supplied by the partner.
/// Lookups accept any non-empty string so that a malformed handle simply
/// resolves to "not found".
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(String);

impl ReservationId {
    /// Wrap an existing reservation handle.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random handle.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of the requesting partner.
///
/// Only the shape is checked (non-empty after trimming); the stored value is
/// the trimmed string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartnerId(String);

impl PartnerId {
    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PartnerId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyPartnerId);
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<PartnerId> for String {
    fn from(id: PartnerId) -> Self {
        id.0
    }
}

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Quantities
// ============================================================================

/// Number of seats held by a single reservation, always in `[1, 10]`.
///
/// # Examples
///
/// ```
/// use ticketboss_core::types::SeatCount;
///
/// assert!(SeatCount::try_from(3).is_ok());
/// assert!(SeatCount::try_from(0).is_err());
/// assert!(SeatCount::try_from(11).is_err());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SeatCount(u32);

impl SeatCount {
    /// Smallest block a partner may reserve.
    pub const MIN: u32 = 1;
    /// Largest block a partner may reserve in one reservation.
    pub const MAX: u32 = 10;

    /// Get the seat count.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for SeatCount {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::SeatsOutOfRange {
                seats: i64::from(value),
            })
        }
    }
}

impl From<SeatCount> for u32 {
    fn from(seats: SeatCount) -> Self {
        seats.0
    }
}

impl fmt::Display for SeatCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signed change applied to `available_seats` by a conditional update.
///
/// A reservation debits (negative), a cancellation credits (positive).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatDelta(i64);

impl SeatDelta {
    /// Delta that takes `seats` out of the pool.
    #[must_use]
    pub fn debit(seats: SeatCount) -> Self {
        Self(-i64::from(seats.value()))
    }

    /// Delta that returns `seats` to the pool.
    #[must_use]
    pub fn credit(seats: SeatCount) -> Self {
        Self(i64::from(seats.value()))
    }

    /// Get the signed value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// The delta that undoes this one.
    #[must_use]
    pub const fn inverse(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for SeatDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.0)
    }
}

/// Optimistic-concurrency fencing token of the event record.
///
/// Starts at 0 and is bumped by exactly one on every committed mutation.
///
/// # Examples
///
/// ```
/// use ticketboss_core::types::Version;
///
/// let v0 = Version::INITIAL;
/// assert_eq!(v0.next(), Version::new(1));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Version of a freshly created event.
    pub const INITIAL: Self = Self(0);

    /// Create a `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ============================================================================
// Records
// ============================================================================

/// The inventory resource: one countable pool of seats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Stable identifier
    pub event_id: EventId,
    /// Display name
    pub name: String,
    /// Immutable capacity (at least 1)
    pub total_seats: u32,
    /// Seats not held by any reservation, in `[0, total_seats]`
    pub available_seats: u32,
    /// Fencing token, bumped on every committed mutation
    pub version: Version,
}

impl Event {
    /// Create a fresh event with every seat available at the initial version.
    #[must_use]
    pub fn new(event_id: EventId, name: impl Into<String>, total_seats: u32) -> Self {
        Self {
            event_id,
            name: name.into(),
            total_seats,
            available_seats: total_seats,
            version: Version::INITIAL,
        }
    }

    /// Whether `seats` could be debited from this snapshot.
    #[must_use]
    pub const fn can_reserve(&self, seats: SeatCount) -> bool {
        self.available_seats >= seats.value()
    }

    /// Apply `delta` and bump the version.
    ///
    /// Returns `None` if the result would leave `available_seats` outside
    /// `[0, total_seats]`.
    #[must_use]
    pub fn apply(&self, delta: SeatDelta) -> Option<Self> {
        let available = i64::from(self.available_seats) + delta.value();
        if available < 0 || available > i64::from(self.total_seats) {
            return None;
        }
        let available_seats = u32::try_from(available).ok()?;

        Some(Self {
            available_seats,
            version: self.version.next(),
            ..self.clone()
        })
    }
}

/// Durable proof that `seats` are allocated to a partner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique handle, generated at creation time
    pub reservation_id: ReservationId,
    /// Requesting partner
    pub partner_id: PartnerId,
    /// Seats held
    pub seats: SeatCount,
    /// Event the seats were drawn from
    pub event_id: EventId,
    /// Creation timestamp (informational)
    pub created_at: DateTime<Utc>,
}

/// Status reported for a successful reservation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Seats are debited and the reservation record exists
    Confirmed,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// Result of a successful `reserve_seats` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationConfirmation {
    /// Handle to use for cancellation
    pub reservation_id: ReservationId,
    /// Seats granted
    pub seats: SeatCount,
    /// Always [`ReservationStatus::Confirmed`]
    pub status: ReservationStatus,
}

/// Result of a `cancel_reservation` call that did not fail.
///
/// "Not found" covers both never-existed and already-cancelled; it is a normal
/// outcome, not an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelOutcome {
    /// Seats were credited back and the record deleted
    Cancelled,
    /// No such reservation; inventory untouched
    NotFound,
}

impl CancelOutcome {
    /// Whether the cancellation took effect.
    #[must_use]
    pub const fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Aggregate over the active reservations of one event.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationTally {
    /// Number of active reservations
    pub count: u64,
    /// Sum of their seats
    pub seats: u64,
}

/// Read-only snapshot of the event plus its reservation count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Event identifier
    pub event_id: EventId,
    /// Display name
    pub name: String,
    /// Capacity
    pub total_seats: u32,
    /// Seats still available
    pub available_seats: u32,
    /// Number of active reservations
    pub reservation_count: u64,
    /// Current fencing token
    pub version: Version,
}

/// Comparison of the inventory counter with the reservation records.
///
/// A positive `drift` means seats were debited without a matching
/// reservation record (a crash between the two steps of a reserve).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservationReport {
    /// Event identifier
    pub event_id: EventId,
    /// Capacity
    pub total_seats: u32,
    /// Counter value
    pub available_seats: u32,
    /// Sum of seats over active reservations
    pub reserved_seats: u64,
    /// Number of active reservations
    pub reservation_count: u64,
    /// `total - available - reserved`
    pub drift: i64,
}

impl ConservationReport {
    /// Build a report from an event snapshot and a reservation tally.
    #[must_use]
    pub fn new(event: &Event, tally: ReservationTally) -> Self {
        let reserved = i64::try_from(tally.seats).unwrap_or(i64::MAX);
        let drift = i64::from(event.total_seats) - i64::from(event.available_seats) - reserved;
        Self {
            event_id: event.event_id.clone(),
            total_seats: event.total_seats,
            available_seats: event.available_seats,
            reserved_seats: tally.seats,
            reservation_count: tally.count,
            drift,
        }
    }

    /// Whether `available + Σ reserved == total`.
    #[must_use]
    pub const fn is_conserved(&self) -> bool {
        self.drift == 0
    }
}
