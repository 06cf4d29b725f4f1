//! Fault-injecting store wrappers.
//!
//! Wrap the in-memory stores to force the paths that real contention or a
//! flaky backend would take: lost version races, failed record writes, a
//! record vanishing between lookup and delete, and a writer parked between
//! its read and its write.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use crate::stores::{InMemoryInventoryStore, InMemoryReservationStore};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tokio::sync::{Notify, Semaphore};
use ticketboss_core::{
    Event, EventId, InventoryStore, Reservation, ReservationId, ReservationStore,
    ReservationTally, SeatDelta, SeededEvent, StoreError, StoreFuture, Version,
};

/// Inventory store that loses the version race a configurable number of times.
///
/// Each forced loss reports `VersionMismatch` without writing. Once the
/// budget is spent, calls go through to the wrapped store.
#[derive(Debug)]
pub struct ContendedInventoryStore {
    inner: InMemoryInventoryStore,
    remaining_conflicts: AtomicU32,
    update_calls: AtomicU32,
}

impl ContendedInventoryStore {
    /// Lose the first `conflicts` conditional updates.
    #[must_use]
    pub const fn new(inner: InMemoryInventoryStore, conflicts: u32) -> Self {
        Self {
            inner,
            remaining_conflicts: AtomicU32::new(conflicts),
            update_calls: AtomicU32::new(0),
        }
    }

    /// Lose every conditional update.
    #[must_use]
    pub const fn always(inner: InMemoryInventoryStore) -> Self {
        Self::new(inner, u32::MAX)
    }

    /// Number of `conditional_update` calls seen so far.
    #[must_use]
    pub fn update_calls(&self) -> u32 {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &InMemoryInventoryStore {
        &self.inner
    }

    fn take_conflict(&self) -> bool {
        self.remaining_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl InventoryStore for ContendedInventoryStore {
    fn load_event<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, Option<Event>> {
        self.inner.load_event(event_id)
    }

    fn conditional_update<'a>(
        &'a self,
        event_id: &'a EventId,
        expected: Version,
        delta: SeatDelta,
    ) -> StoreFuture<'a, Event> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_conflict() {
            return Box::pin(async move {
                Err::<Event, _>(StoreError::VersionMismatch {
                    event_id: event_id.clone(),
                    expected,
                    actual: expected.next(),
                })
            });
        }
        self.inner.conditional_update(event_id, expected, delta)
    }

    fn insert_event_if_absent(&self, event: Event) -> StoreFuture<'_, SeededEvent> {
        self.inner.insert_event_if_absent(event)
    }
}

/// Inventory store that holds every conditional update until released.
///
/// Each update signals [`arrived`](Self::arrived) and then waits for a permit
/// from [`open`](Self::open) before reaching the wrapped store, so a test can
/// run other calls while a writer sits inside its compare-and-swap window.
#[derive(Debug)]
pub struct GatedInventoryStore {
    inner: InMemoryInventoryStore,
    gate: Semaphore,
    arrived: Notify,
}

impl GatedInventoryStore {
    /// Wrap `inner` with the gate closed.
    #[must_use]
    pub fn new(inner: InMemoryInventoryStore) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
            arrived: Notify::new(),
        }
    }

    /// Wait until a conditional update reaches the gate.
    pub async fn arrived(&self) {
        self.arrived.notified().await;
    }

    /// Let `updates` held or future conditional updates through.
    pub fn open(&self, updates: usize) {
        self.gate.add_permits(updates);
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &InMemoryInventoryStore {
        &self.inner
    }
}

impl InventoryStore for GatedInventoryStore {
    fn load_event<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, Option<Event>> {
        self.inner.load_event(event_id)
    }

    fn conditional_update<'a>(
        &'a self,
        event_id: &'a EventId,
        expected: Version,
        delta: SeatDelta,
    ) -> StoreFuture<'a, Event> {
        Box::pin(async move {
            self.arrived.notify_one();
            self.gate
                .acquire()
                .await
                .map_err(|_| StoreError::Database("gate closed".into()))?
                .forget();
            self.inner.conditional_update(event_id, expected, delta).await
        })
    }

    fn insert_event_if_absent(&self, event: Event) -> StoreFuture<'_, SeededEvent> {
        self.inner.insert_event_if_absent(event)
    }
}

/// What the next `delete_by_id` should do instead of deleting normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteFault {
    /// Fail with this error and leave the record in place
    Error(StoreError),
    /// Remove the record as a concurrent cancel would, then report `false`
    Vanish,
}

/// Reservation store whose next create or delete can be made to fail.
#[derive(Debug, Default)]
pub struct FaultyReservationStore {
    inner: InMemoryReservationStore,
    next_create: Mutex<Option<StoreError>>,
    next_delete: Mutex<Option<DeleteFault>>,
}

impl FaultyReservationStore {
    /// Wrap `inner` with no faults armed.
    #[must_use]
    pub fn new(inner: InMemoryReservationStore) -> Self {
        Self {
            inner,
            next_create: Mutex::new(None),
            next_delete: Mutex::new(None),
        }
    }

    /// Fail the next `create` with `error`.
    pub fn fail_next_create(&self, error: StoreError) {
        *self.next_create.lock().unwrap() = Some(error);
    }

    /// Apply `fault` to the next `delete_by_id`.
    pub fn fail_next_delete(&self, fault: DeleteFault) {
        *self.next_delete.lock().unwrap() = Some(fault);
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &InMemoryReservationStore {
        &self.inner
    }
}

impl ReservationStore for FaultyReservationStore {
    fn create(&self, reservation: Reservation) -> StoreFuture<'_, ()> {
        let fault = self.next_create.lock().unwrap().take();
        match fault {
            Some(error) => Box::pin(async move { Err::<(), _>(error) }),
            None => self.inner.create(reservation),
        }
    }

    fn find_by_id<'a>(
        &'a self,
        reservation_id: &'a ReservationId,
    ) -> StoreFuture<'a, Option<Reservation>> {
        self.inner.find_by_id(reservation_id)
    }

    fn delete_by_id<'a>(&'a self, reservation_id: &'a ReservationId) -> StoreFuture<'a, bool> {
        let fault = self.next_delete.lock().unwrap().take();
        match fault {
            Some(DeleteFault::Error(error)) => Box::pin(async move { Err::<bool, _>(error) }),
            Some(DeleteFault::Vanish) => {
                self.inner.remove(reservation_id);
                Box::pin(async move { Ok::<_, StoreError>(false) })
            }
            None => self.inner.delete_by_id(reservation_id),
        }
    }

    fn tally<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, ReservationTally> {
        self.inner.tally(event_id)
    }
}
