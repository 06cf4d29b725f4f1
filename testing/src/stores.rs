//! In-memory store implementations
//!
//! Fast, deterministic backends for allocator tests:
//! - [`InMemoryInventoryStore`]: `HashMap`-backed event records with a real
//!   compare-and-swap
//! - [`InMemoryReservationStore`]: `HashMap`-backed reservation records
//!
//! Both yield to the scheduler before touching their lock so concurrent
//! callers on a multi-threaded runtime actually interleave.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock};
use ticketboss_core::{
    Event, EventId, InventoryStore, Reservation, ReservationId, ReservationStore,
    ReservationTally, SeatDelta, SeededEvent, StoreError, StoreFuture, Version,
};

/// In-memory inventory store for fast, deterministic testing.
///
/// # Example
///
/// ```
/// use ticketboss_core::{Event, EventId, InventoryStore, SeatCount, SeatDelta, Version};
/// use ticketboss_testing::InMemoryInventoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let event_id = EventId::new("meetup");
/// let store = InMemoryInventoryStore::with_event(Event::new(event_id.clone(), "Meetup", 10));
///
/// let seats = SeatCount::try_from(3)?;
/// let committed = store
///     .conditional_update(&event_id, Version::INITIAL, SeatDelta::debit(seats))
///     .await?;
/// assert_eq!(committed.available_seats, 7);
///
/// // The same expected version now loses
/// assert!(store
///     .conditional_update(&event_id, Version::INITIAL, SeatDelta::debit(seats))
///     .await
///     .is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryInventoryStore {
    events: Arc<RwLock<HashMap<EventId, Event>>>,
}

impl InMemoryInventoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `event`.
    #[must_use]
    pub fn with_event(event: Event) -> Self {
        let store = Self::new();
        store.put(event);
        store
    }

    /// Overwrite an event record, bypassing the version check.
    ///
    /// Useful for arranging a starting state (e.g. a nearly sold-out event).
    pub fn put(&self, event: Event) {
        self.events
            .write()
            .unwrap()
            .insert(event.event_id.clone(), event);
    }

    /// Current record, read synchronously.
    #[must_use]
    pub fn snapshot(&self, event_id: &EventId) -> Option<Event> {
        self.events.read().unwrap().get(event_id).cloned()
    }

    /// Remove an event record.
    pub fn remove(&self, event_id: &EventId) {
        self.events.write().unwrap().remove(event_id);
    }

    fn compare_and_apply(
        &self,
        event_id: &EventId,
        expected: Version,
        delta: SeatDelta,
    ) -> Result<Event, StoreError> {
        let mut events = self.events.write().unwrap();
        let current = events
            .get_mut(event_id)
            .ok_or_else(|| StoreError::EventNotFound(event_id.clone()))?;

        if current.version != expected {
            return Err(StoreError::VersionMismatch {
                event_id: event_id.clone(),
                expected,
                actual: current.version,
            });
        }

        let next = current
            .apply(delta)
            .ok_or_else(|| StoreError::CapacityViolation {
                event_id: event_id.clone(),
                available: current.available_seats,
                delta,
            })?;

        *current = next.clone();
        Ok(next)
    }

    fn insert_absent(&self, event: Event) -> SeededEvent {
        match self.events.write().unwrap().entry(event.event_id.clone()) {
            Entry::Occupied(stored) => SeededEvent {
                event: stored.get().clone(),
                created: false,
            },
            Entry::Vacant(slot) => SeededEvent {
                event: slot.insert(event).clone(),
                created: true,
            },
        }
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn load_event<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, Option<Event>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            Ok(self.snapshot(event_id))
        })
    }

    fn conditional_update<'a>(
        &'a self,
        event_id: &'a EventId,
        expected: Version,
        delta: SeatDelta,
    ) -> StoreFuture<'a, Event> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.compare_and_apply(event_id, expected, delta)
        })
    }

    fn insert_event_if_absent(&self, event: Event) -> StoreFuture<'_, SeededEvent> {
        Box::pin(async move { Ok(self.insert_absent(event)) })
    }
}

/// In-memory reservation store for fast, deterministic testing.
#[derive(Clone, Debug, Default)]
pub struct InMemoryReservationStore {
    records: Arc<RwLock<HashMap<ReservationId, Reservation>>>,
}

impl InMemoryReservationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored reservations across all events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    /// Current record, read synchronously.
    #[must_use]
    pub fn get(&self, reservation_id: &ReservationId) -> Option<Reservation> {
        self.records.read().unwrap().get(reservation_id).cloned()
    }

    /// Insert a record without the duplicate check.
    pub fn put(&self, reservation: Reservation) {
        self.records
            .write()
            .unwrap()
            .insert(reservation.reservation_id.clone(), reservation);
    }

    /// Remove a record synchronously, returning whether it existed.
    pub fn remove(&self, reservation_id: &ReservationId) -> bool {
        self.records.write().unwrap().remove(reservation_id).is_some()
    }

    fn insert_new(&self, reservation: Reservation) -> Result<(), StoreError> {
        match self
            .records
            .write()
            .unwrap()
            .entry(reservation.reservation_id.clone())
        {
            Entry::Occupied(_) => Err(StoreError::DuplicateReservation(reservation.reservation_id)),
            Entry::Vacant(slot) => {
                slot.insert(reservation);
                Ok(())
            }
        }
    }

    fn sum_for(&self, event_id: &EventId) -> ReservationTally {
        self.records
            .read()
            .unwrap()
            .values()
            .filter(|r| &r.event_id == event_id)
            .fold(ReservationTally::default(), |tally, r| ReservationTally {
                count: tally.count + 1,
                seats: tally.seats + u64::from(r.seats.value()),
            })
    }
}

impl ReservationStore for InMemoryReservationStore {
    fn create(&self, reservation: Reservation) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.insert_new(reservation)
        })
    }

    fn find_by_id<'a>(
        &'a self,
        reservation_id: &'a ReservationId,
    ) -> StoreFuture<'a, Option<Reservation>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            Ok(self.get(reservation_id))
        })
    }

    fn delete_by_id<'a>(&'a self, reservation_id: &'a ReservationId) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            Ok(self.remove(reservation_id))
        })
    }

    fn tally<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, ReservationTally> {
        Box::pin(async move { Ok(self.sum_for(event_id)) })
    }
}
