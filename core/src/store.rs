//! Storage contracts for the two records the allocator coordinates.
//!
//! # Design
//!
//! Neither store offers transactions. The only primitive the allocator relies
//! on is [`InventoryStore::conditional_update`]: a single-shot, atomic
//! compare-and-swap on the event's version. No lock is held between calls.
//!
//! # Implementations
//!
//! - `InMemoryInventoryStore` / `InMemoryReservationStore` (in
//!   `ticketboss-testing`): fast, deterministic tests
//! - `PostgresInventoryStore` / `PostgresReservationStore` (in
//!   `ticketboss-postgres`): production
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! allocator can hold `Arc<dyn InventoryStore>` and swap backends at runtime.

use crate::types::{
    Event, EventId, Reservation, ReservationId, ReservationTally, SeatDelta, Version,
};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors reported by storage backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency conflict: stored version differs from the expected one.
    #[error("version mismatch on event {event_id}: expected {expected}, found {actual}")]
    VersionMismatch {
        /// Event being updated
        event_id: EventId,
        /// Version the caller read
        expected: Version,
        /// Version currently stored
        actual: Version,
    },

    /// No event record with this id.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// Update would push `available_seats` outside `[0, total_seats]`.
    #[error("seat delta {delta} would leave event {event_id} outside capacity (available {available})")]
    CapacityViolation {
        /// Event being updated
        event_id: EventId,
        /// Seats available before the update
        available: u32,
        /// Rejected delta
        delta: SeatDelta,
    },

    /// A reservation with this id already exists.
    #[error("duplicate reservation id: {0}")]
    DuplicateReservation(ReservationId),

    /// Database connection or query failed.
    #[error("database error: {0}")]
    Database(String),

    /// Stored data could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether this is the (retryable) compare-and-swap failure.
    #[must_use]
    pub const fn is_version_mismatch(&self) -> bool {
        matches!(self, Self::VersionMismatch { .. })
    }
}

/// Result of [`InventoryStore::insert_event_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededEvent {
    /// The record as stored after the call
    pub event: Event,
    /// Whether this call inserted it
    pub created: bool,
}

/// Holds the event record and its seat counter.
pub trait InventoryStore: Send + Sync {
    /// Load the event, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// - `Database` / `Serialization`: backend failure
    fn load_event<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, Option<Event>>;

    /// Atomically apply `delta` to `available_seats` and bump `version`, but
    /// only if the stored version equals `expected`.
    ///
    /// If two callers race with the same `expected`, exactly one succeeds;
    /// the other observes `VersionMismatch`. Never writes partially.
    ///
    /// Returns the event as committed.
    ///
    /// # Errors
    ///
    /// - `VersionMismatch`: another writer committed first
    /// - `EventNotFound`: no such event
    /// - `CapacityViolation`: result would leave `[0, total_seats]`
    /// - `Database` / `Serialization`: backend failure
    fn conditional_update<'a>(
        &'a self,
        event_id: &'a EventId,
        expected: Version,
        delta: SeatDelta,
    ) -> StoreFuture<'a, Event>;

    /// Create `event` if no record with its id exists; return the stored record.
    ///
    /// An existing record is returned untouched with `created == false`.
    ///
    /// # Errors
    ///
    /// - `Database` / `Serialization`: backend failure
    fn insert_event_if_absent(&self, event: Event) -> StoreFuture<'_, SeededEvent>;
}

/// Holds reservation records keyed by their unique id.
pub trait ReservationStore: Send + Sync {
    /// Atomically create a record.
    ///
    /// # Errors
    ///
    /// - `DuplicateReservation`: the id is taken
    /// - `Database` / `Serialization`: backend failure
    fn create(&self, reservation: Reservation) -> StoreFuture<'_, ()>;

    /// Point lookup by id.
    ///
    /// # Errors
    ///
    /// - `Database` / `Serialization`: backend failure
    fn find_by_id<'a>(
        &'a self,
        reservation_id: &'a ReservationId,
    ) -> StoreFuture<'a, Option<Reservation>>;

    /// Delete by id. Returns `false` if no record existed.
    ///
    /// # Errors
    ///
    /// - `Database`: backend failure
    fn delete_by_id<'a>(&'a self, reservation_id: &'a ReservationId) -> StoreFuture<'a, bool>;

    /// Count the active reservations of an event and sum their seats.
    ///
    /// # Errors
    ///
    /// - `Database`: backend failure
    fn tally<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, ReservationTally>;
}
