//! # TicketBoss Core
//!
//! Domain types, storage contracts and admission policy for a single-event
//! seat inventory shared by many concurrent partners.
//!
//! ## Core Concepts
//!
//! - **Event**: the one countable pool of seats, guarded by a version counter
//! - **Reservation**: durable proof that a block of seats belongs to a partner
//! - **Conditional update**: compare-and-swap on the event version, the only
//!   atomic primitive the allocator needs from storage
//! - **Policy**: pure checks on partner id and seat count, run before any I/O
//!
//! ## Invariant
//!
//! ```text
//! available_seats + Σ(active reservation.seats) == total_seats
//! ```
//!
//! The allocator that maintains it lives in `ticketboss-runtime`.

pub mod error;
pub mod policy;
pub mod store;
pub mod types;

pub use error::{ErrorKind, Operation, ReservationError, ValidationError};
pub use store::{InventoryStore, ReservationStore, SeededEvent, StoreError, StoreFuture};
pub use types::{
    CancelOutcome, ConservationReport, Event, EventId, EventSummary, PartnerId, Reservation,
    ReservationConfirmation, ReservationId, ReservationStatus, ReservationTally, SeatCount,
    SeatDelta, Version,
};

/// Environment module - Dependency injection traits
///
/// Time and id generation are injected so tests can pin timestamps and force
/// id collisions.
pub mod environment {
    use crate::types::ReservationId;
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Source of reservation ids.
    pub trait IdGenerator: Send + Sync {
        /// Produce an id not expected to collide with any existing one.
        fn next_reservation_id(&self) -> ReservationId;
    }

    /// Random UUID v4 ids.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct UuidGenerator;

    impl IdGenerator for UuidGenerator {
        fn next_reservation_id(&self) -> ReservationId {
            ReservationId::generate()
        }
    }
}
