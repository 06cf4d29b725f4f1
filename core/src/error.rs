//! Error taxonomy for reservation operations.
//!
//! Three layers:
//!
//! - [`ValidationError`]: caller input is malformed. Raised by the policy
//!   layer before any store is touched.
//! - [`StoreError`](crate::store::StoreError): what a storage backend reports.
//!   Only `VersionMismatch` is ever retried, and only by the allocator.
//! - [`ReservationError`]: what a caller of the allocator sees.
//!
//! [`ReservationError::kind`] collapses the taxonomy into the handful of
//! outcomes a transport layer has to distinguish.

use crate::store::StoreError;
use crate::types::{EventId, ReservationId};
use thiserror::Error;

/// Caller input rejected by the admission policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Partner id missing or blank.
    #[error("partnerId is required")]
    EmptyPartnerId,

    /// Seat count supplied but not an integer.
    #[error("seats must be an integer")]
    SeatsNotInteger,

    /// Seat count outside `[1, 10]`.
    #[error("seats must be between 1 and 10 (got {seats})")]
    SeatsOutOfRange {
        /// The rejected value
        seats: i64,
    },

    /// Reservation id missing or blank.
    #[error("Invalid reservation ID")]
    EmptyReservationId,
}

/// Which allocator operation produced a conflict.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Seat debit for a new reservation
    Reserve,
    /// Seat credit for a cancellation
    Cancel,
}

impl Operation {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reserve => "reserve",
            Self::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of `reserve_seats` / `cancel_reservation` / `event_summary`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// Input malformed; never retried internally.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The inventory record does not exist (bootstrap/configuration fault).
    #[error("event {0} not found")]
    EventNotFound(EventId),

    /// Not enough seats left; a legitimate business outcome.
    #[error("not enough seats left: requested {requested}, available {available}")]
    InsufficientSeats {
        /// Seats asked for
        requested: u32,
        /// Seats available at the last read
        available: u32,
    },

    /// Retry budget exhausted by repeated version mismatches.
    #[error("concurrency conflict during {operation} after {attempts} attempts")]
    ConcurrencyConflict {
        /// Operation that gave up
        operation: Operation,
        /// Attempts made
        attempts: u32,
    },

    /// Generated reservation id collided with an existing record.
    #[error("duplicate reservation id {0}")]
    DuplicateId(ReservationId),

    /// Storage backend failure (connectivity, decoding, constraint).
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EventNotFound(event_id) => Self::EventNotFound(event_id),
            StoreError::DuplicateReservation(reservation_id) => Self::DuplicateId(reservation_id),
            other => Self::Store(other),
        }
    }
}

/// Caller-visible classification of a [`ReservationError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller must fix the input
    Validation,
    /// Business rule said no (no stock)
    Rejected,
    /// Contended; the same request may succeed later
    Conflict,
    /// Server-side fault
    Internal,
}

impl ReservationError {
    /// Classify this error for the calling layer.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InsufficientSeats { .. } => ErrorKind::Rejected,
            Self::ConcurrencyConflict { .. } => ErrorKind::Conflict,
            Self::EventNotFound(_) | Self::DuplicateId(_) | Self::Store(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::EventNotFound(_) => "EVENT_NOT_FOUND",
            Self::InsufficientSeats { .. } => "INSUFFICIENT_SEATS",
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::DuplicateId(_) => "DUPLICATE_ID",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Whether the caller may resubmit the identical request later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict)
    }
}
