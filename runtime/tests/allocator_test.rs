//! Behavioural tests for `SeatAllocator` against the in-memory stores.
//!
//! Covers the happy paths, every error kind, retry exhaustion and the
//! compensation paths taken when the second write of a reserve or cancel
//! fails.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use std::sync::Arc;
use std::time::Duration;
use ticketboss_core::environment::Clock;
use ticketboss_core::{
    CancelOutcome, Event, EventId, Operation, ReservationError, ReservationId, ReservationStatus,
    StoreError, ValidationError, Version,
};
use ticketboss_runtime::{RetryPolicy, SeatAllocator};
use ticketboss_testing::helpers::{init_test_tracing, seats, test_event, test_reservation};
use ticketboss_testing::{
    test_clock, ContendedInventoryStore, DeleteFault, FaultyReservationStore, FixedIdGenerator,
    InMemoryInventoryStore, InMemoryReservationStore, SequentialIdGenerator,
};

struct Harness {
    allocator: SeatAllocator,
    inventory: InMemoryInventoryStore,
    reservations: InMemoryReservationStore,
    event_id: EventId,
}

impl Harness {
    fn new(event: Event) -> Self {
        init_test_tracing();
        let event_id = event.event_id.clone();
        let inventory = InMemoryInventoryStore::with_event(event);
        let reservations = InMemoryReservationStore::new();
        let allocator = SeatAllocator::new(
            event_id.clone(),
            Arc::new(inventory.clone()),
            Arc::new(reservations.clone()),
        )
        .with_clock(Arc::new(test_clock()))
        .with_id_generator(Arc::new(SequentialIdGenerator::new()));

        Self {
            allocator,
            inventory,
            reservations,
            event_id,
        }
    }

    fn event(&self) -> Event {
        self.inventory.snapshot(&self.event_id).unwrap()
    }
}

fn event_with_available(total: u32, available: u32) -> Event {
    let mut event = test_event(total);
    event.available_seats = available;
    event
}

// ============================================================================
// Reserve
// ============================================================================

#[tokio::test]
async fn test_reserve_debits_and_records() {
    let h = Harness::new(test_event(500));

    let confirmation = h.allocator.reserve_seats("partner-a", 3).await.unwrap();

    assert_eq!(confirmation.reservation_id, ReservationId::new("res-1"));
    assert_eq!(confirmation.seats, seats(3));
    assert_eq!(confirmation.status, ReservationStatus::Confirmed);

    let event = h.event();
    assert_eq!(event.available_seats, 497);
    assert_eq!(event.version, Version::new(1));

    let record = h.reservations.get(&confirmation.reservation_id).unwrap();
    assert_eq!(record.partner_id.as_str(), "partner-a");
    assert_eq!(record.seats, seats(3));
    assert_eq!(record.event_id, h.event_id);
    assert_eq!(record.created_at, test_clock().now());
}

#[tokio::test]
async fn test_reserve_trims_partner_id() {
    let h = Harness::new(test_event(10));
    let confirmation = h.allocator.reserve_seats("  abc-corp ", 1).await.unwrap();
    let record = h.reservations.get(&confirmation.reservation_id).unwrap();
    assert_eq!(record.partner_id.as_str(), "abc-corp");
}

#[tokio::test]
async fn test_reserve_last_seats_exactly() {
    let h = Harness::new(event_with_available(500, 3));

    h.allocator.reserve_seats("partner-a", 3).await.unwrap();
    assert_eq!(h.event().available_seats, 0);

    let err = h.allocator.reserve_seats("partner-b", 1).await.unwrap_err();
    assert_eq!(
        err,
        ReservationError::InsufficientSeats {
            requested: 1,
            available: 0
        }
    );
}

#[tokio::test]
async fn test_reserve_insufficient_leaves_state_untouched() {
    let h = Harness::new(event_with_available(500, 2));

    let err = h.allocator.reserve_seats("partner-a", 3).await.unwrap_err();

    assert_eq!(
        err,
        ReservationError::InsufficientSeats {
            requested: 3,
            available: 2
        }
    );
    assert_eq!(h.event().available_seats, 2);
    assert_eq!(h.event().version, Version::INITIAL);
    assert!(h.reservations.is_empty());
}

#[tokio::test]
async fn test_reserve_validation_never_touches_stores() {
    let h = Harness::new(test_event(500));

    assert_eq!(
        h.allocator.reserve_seats("", 3).await.unwrap_err(),
        ReservationError::Validation(ValidationError::EmptyPartnerId)
    );
    assert_eq!(
        h.allocator.reserve_seats("partner-a", 0).await.unwrap_err(),
        ReservationError::Validation(ValidationError::SeatsOutOfRange { seats: 0 })
    );
    assert_eq!(
        h.allocator.reserve_seats("partner-a", 11).await.unwrap_err(),
        ReservationError::Validation(ValidationError::SeatsOutOfRange { seats: 11 })
    );

    assert_eq!(h.event().version, Version::INITIAL);
    assert!(h.reservations.is_empty());
}

#[tokio::test]
async fn test_reserve_missing_event() {
    let h = Harness::new(test_event(500));
    h.inventory.remove(&h.event_id);

    let err = h.allocator.reserve_seats("partner-a", 1).await.unwrap_err();
    assert_eq!(err, ReservationError::EventNotFound(h.event_id.clone()));
    assert!(h.reservations.is_empty());
}

// ============================================================================
// Retry and backoff
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_reserve_gives_up_after_five_attempts() {
    init_test_tracing();
    let event = test_event(500);
    let event_id = event.event_id.clone();
    let inventory = Arc::new(ContendedInventoryStore::always(
        InMemoryInventoryStore::with_event(event),
    ));
    let reservations = InMemoryReservationStore::new();
    let allocator = SeatAllocator::new(
        event_id.clone(),
        inventory.clone(),
        Arc::new(reservations.clone()),
    );

    let started = tokio::time::Instant::now();
    let err = allocator.reserve_seats("partner-a", 2).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(
        err,
        ReservationError::ConcurrencyConflict {
            operation: Operation::Reserve,
            attempts: 5
        }
    );
    assert_eq!(inventory.update_calls(), 5);
    assert!(reservations.is_empty());
    assert_eq!(inventory.inner().snapshot(&event_id).unwrap().available_seats, 500);

    // 10 + 20 + 40 + 80, and no sleep after the last attempt
    assert!(elapsed >= Duration::from_millis(150));
    assert!(elapsed < Duration::from_millis(310));
}

#[tokio::test(start_paused = true)]
async fn test_reserve_succeeds_after_transient_conflicts() {
    let event = test_event(500);
    let event_id = event.event_id.clone();
    let inventory = Arc::new(ContendedInventoryStore::new(
        InMemoryInventoryStore::with_event(event),
        2,
    ));
    let allocator = SeatAllocator::new(
        event_id.clone(),
        inventory.clone(),
        Arc::new(InMemoryReservationStore::new()),
    );

    let confirmation = allocator.reserve_seats("partner-a", 4).await.unwrap();

    assert_eq!(confirmation.seats, seats(4));
    assert_eq!(inventory.update_calls(), 3);
    assert_eq!(inventory.inner().snapshot(&event_id).unwrap().available_seats, 496);
}

#[tokio::test(start_paused = true)]
async fn test_retry_policy_is_configurable() {
    let event = test_event(500);
    let event_id = event.event_id.clone();
    let inventory = Arc::new(ContendedInventoryStore::always(
        InMemoryInventoryStore::with_event(event),
    ));
    let allocator = SeatAllocator::new(
        event_id,
        inventory.clone(),
        Arc::new(InMemoryReservationStore::new()),
    )
    .with_retry_policy(RetryPolicy::builder().max_attempts(3).build());

    let err = allocator.reserve_seats("partner-a", 1).await.unwrap_err();

    assert_eq!(
        err,
        ReservationError::ConcurrencyConflict {
            operation: Operation::Reserve,
            attempts: 3
        }
    );
    assert_eq!(inventory.update_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_gives_up_after_five_attempts() {
    let reservation = test_reservation("r-1", 4);
    let event = event_with_available(500, 496);
    let event_id = event.event_id.clone();
    let inventory = Arc::new(ContendedInventoryStore::always(
        InMemoryInventoryStore::with_event(event),
    ));
    let reservations = InMemoryReservationStore::new();
    reservations.put(reservation.clone());
    let allocator = SeatAllocator::new(event_id, inventory.clone(), Arc::new(reservations.clone()));

    let err = allocator.cancel(&reservation.reservation_id).await.unwrap_err();

    assert_eq!(
        err,
        ReservationError::ConcurrencyConflict {
            operation: Operation::Cancel,
            attempts: 5
        }
    );
    assert!(err.is_retryable());
    assert!(reservations.get(&reservation.reservation_id).is_some());
}

// ============================================================================
// Cancel
// ============================================================================

#[tokio::test]
async fn test_cancel_credits_and_deletes() {
    let h = Harness::new(test_event(500));
    let confirmation = h.allocator.reserve_seats("partner-a", 5).await.unwrap();

    let outcome = h
        .allocator
        .cancel_reservation(confirmation.reservation_id.as_str())
        .await
        .unwrap();

    assert_eq!(outcome, CancelOutcome::Cancelled);
    assert_eq!(h.event().available_seats, 500);
    assert_eq!(h.event().version, Version::new(2));
    assert!(h.reservations.is_empty());
}

#[tokio::test]
async fn test_cancel_twice_second_is_not_found() {
    let h = Harness::new(test_event(500));
    let confirmation = h.allocator.reserve_seats("partner-a", 5).await.unwrap();

    let first = h.allocator.cancel(&confirmation.reservation_id).await.unwrap();
    let second = h.allocator.cancel(&confirmation.reservation_id).await.unwrap();

    assert!(first.is_cancelled());
    assert_eq!(second, CancelOutcome::NotFound);
    assert_eq!(h.event().available_seats, 500);
    assert_eq!(h.event().version, Version::new(2));
}

#[tokio::test]
async fn test_cancel_unknown_id_is_not_found() {
    let h = Harness::new(test_event(500));

    let outcome = h.allocator.cancel_reservation("no-such-id").await.unwrap();

    assert_eq!(outcome, CancelOutcome::NotFound);
    assert_eq!(h.event().version, Version::INITIAL);
}

#[tokio::test]
async fn test_cancel_blank_id_is_validation_error() {
    let h = Harness::new(test_event(500));
    assert_eq!(
        h.allocator.cancel_reservation("   ").await.unwrap_err(),
        ReservationError::Validation(ValidationError::EmptyReservationId)
    );
}

// ============================================================================
// Partial failures
// ============================================================================

fn faulty_allocator(
    event: Event,
) -> (SeatAllocator, InMemoryInventoryStore, Arc<FaultyReservationStore>) {
    init_test_tracing();
    let event_id = event.event_id.clone();
    let inventory = InMemoryInventoryStore::with_event(event);
    let reservations = Arc::new(FaultyReservationStore::new(InMemoryReservationStore::new()));
    let allocator = SeatAllocator::new(
        event_id,
        Arc::new(inventory.clone()),
        reservations.clone(),
    )
    .with_id_generator(Arc::new(SequentialIdGenerator::new()));
    (allocator, inventory, reservations)
}

#[tokio::test]
async fn test_duplicate_id_is_reported_and_debit_undone() {
    let h = Harness::new(test_event(500));
    let allocator = h
        .allocator
        .clone()
        .with_id_generator(Arc::new(FixedIdGenerator(ReservationId::new("dup"))));

    allocator.reserve_seats("partner-a", 2).await.unwrap();
    let err = allocator.reserve_seats("partner-b", 3).await.unwrap_err();

    assert_eq!(err, ReservationError::DuplicateId(ReservationId::new("dup")));
    assert_eq!(h.event().available_seats, 498);
    assert_eq!(h.reservations.len(), 1);
    assert!(allocator.audit().await.unwrap().is_conserved());
}

#[tokio::test]
async fn test_failed_record_create_is_compensated() {
    let (allocator, inventory, reservations) = faulty_allocator(test_event(500));
    reservations.fail_next_create(StoreError::Database("connection reset".into()));

    let err = allocator.reserve_seats("partner-a", 4).await.unwrap_err();

    assert_eq!(
        err,
        ReservationError::Store(StoreError::Database("connection reset".into()))
    );
    let event = inventory.snapshot(allocator.event_id()).unwrap();
    assert_eq!(event.available_seats, 500);
    // debit + compensating credit
    assert_eq!(event.version, Version::new(2));
    assert!(reservations.inner().is_empty());
}

#[tokio::test]
async fn test_failed_record_delete_leaves_inventory_untouched() {
    let (allocator, inventory, reservations) = faulty_allocator(test_event(500));
    let confirmation = allocator.reserve_seats("partner-a", 4).await.unwrap();
    reservations.fail_next_delete(DeleteFault::Error(StoreError::Database("timeout".into())));

    let err = allocator.cancel(&confirmation.reservation_id).await.unwrap_err();

    assert!(matches!(err, ReservationError::Store(StoreError::Database(_))));
    let event = inventory.snapshot(allocator.event_id()).unwrap();
    assert_eq!(event.available_seats, 496);
    assert_eq!(event.version, Version::new(1));
    assert!(reservations.inner().get(&confirmation.reservation_id).is_some());
    assert!(allocator.audit().await.unwrap().is_conserved());
}

#[tokio::test]
async fn test_record_vanishing_before_claim_is_not_found() {
    let (allocator, inventory, reservations) = faulty_allocator(test_event(500));
    let confirmation = allocator.reserve_seats("partner-a", 4).await.unwrap();
    reservations.fail_next_delete(DeleteFault::Vanish);

    let outcome = allocator.cancel(&confirmation.reservation_id).await.unwrap();

    assert_eq!(outcome, CancelOutcome::NotFound);
    let event = inventory.snapshot(allocator.event_id()).unwrap();
    assert_eq!(event.available_seats, 496);
    // Only the reserve's debit; the cancel never wrote to the inventory.
    assert_eq!(event.version, Version::new(1));
}

#[tokio::test(start_paused = true)]
async fn test_failed_credit_and_failed_restore_is_reported() {
    let reservation = test_reservation("r-1", 4);
    let inventory = InMemoryInventoryStore::with_event(event_with_available(500, 496));
    let reservations = Arc::new(FaultyReservationStore::new(InMemoryReservationStore::new()));
    reservations.inner().put(reservation.clone());
    let allocator = SeatAllocator::new(
        reservation.event_id.clone(),
        Arc::new(ContendedInventoryStore::always(inventory.clone())),
        reservations.clone(),
    );
    reservations.fail_next_create(StoreError::Database("connection reset".into()));

    let err = allocator.cancel(&reservation.reservation_id).await.unwrap_err();

    assert_eq!(
        err,
        ReservationError::ConcurrencyConflict {
            operation: Operation::Cancel,
            attempts: 5
        }
    );
    // Record gone, seats never credited: under-counted, not oversold.
    assert!(reservations.inner().is_empty());
    let report = allocator.audit().await.unwrap();
    assert_eq!(report.available_seats, 496);
    assert_eq!(report.drift, 4);
}

#[tokio::test]
async fn test_credit_against_missing_event_restores_record() {
    let h = Harness::new(test_event(500));
    let confirmation = h.allocator.reserve_seats("partner-a", 4).await.unwrap();
    h.inventory.remove(&h.event_id);

    let err = h.allocator.cancel(&confirmation.reservation_id).await.unwrap_err();

    assert_eq!(err, ReservationError::EventNotFound(h.event_id.clone()));
    assert!(h.reservations.get(&confirmation.reservation_id).is_some());
}

#[tokio::test]
async fn test_zero_attempt_policy_still_makes_one_attempt() {
    let h = Harness::new(event_with_available(500, 2));
    let allocator = h.allocator.clone().with_retry_policy(RetryPolicy {
        max_attempts: 0,
        ..RetryPolicy::default()
    });

    assert_eq!(allocator.retry_policy().max_attempts, 1);
    assert_eq!(
        allocator.reserve_seats("partner-a", 3).await.unwrap_err(),
        ReservationError::InsufficientSeats {
            requested: 3,
            available: 2
        }
    );

    let confirmation = allocator.reserve_seats("partner-a", 2).await.unwrap();
    assert_eq!(
        allocator.cancel(&confirmation.reservation_id).await.unwrap(),
        CancelOutcome::Cancelled
    );

    h.inventory.remove(&h.event_id);
    assert_eq!(
        allocator.reserve_seats("partner-a", 1).await.unwrap_err(),
        ReservationError::EventNotFound(h.event_id.clone())
    );
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_event_summary_counts_reservations() {
    let h = Harness::new(test_event(500));
    h.allocator.reserve_seats("partner-a", 3).await.unwrap();
    h.allocator.reserve_seats("partner-b", 7).await.unwrap();

    let summary = h.allocator.event_summary().await.unwrap();

    assert_eq!(summary.event_id, h.event_id);
    assert_eq!(summary.name, "Test Event");
    assert_eq!(summary.total_seats, 500);
    assert_eq!(summary.available_seats, 490);
    assert_eq!(summary.reservation_count, 2);
    assert_eq!(summary.version, Version::new(2));
}

#[tokio::test]
async fn test_event_summary_missing_event() {
    let h = Harness::new(test_event(500));
    h.inventory.remove(&h.event_id);
    assert_eq!(
        h.allocator.event_summary().await.unwrap_err(),
        ReservationError::EventNotFound(h.event_id.clone())
    );
}

#[tokio::test]
async fn test_audit_reports_drift() {
    let h = Harness::new(test_event(100));
    h.allocator.reserve_seats("partner-a", 5).await.unwrap();

    let report = h.allocator.audit().await.unwrap();
    assert!(report.is_conserved());
    assert_eq!(report.reserved_seats, 5);

    // Simulate a crash between debit and record creation
    h.inventory.put(event_with_available(100, 92));

    let report = h.allocator.audit().await.unwrap();
    assert_eq!(report.drift, 3);
    assert!(!report.is_conserved());
}
