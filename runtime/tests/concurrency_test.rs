//! Concurrency stress tests for last-seat and double-cancel races.
//!
//! These run many allocator calls at once on a multi-threaded runtime against
//! the in-memory stores (which implement a real compare-and-swap) and check
//! that seats are never oversold and never leaked.
//!
//! Run with: `cargo test -p ticketboss-runtime --test concurrency_test -- --nocapture`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use std::sync::Arc;
use std::time::Duration;
use ticketboss_core::{CancelOutcome, Event, ReservationError};
use ticketboss_runtime::{RetryPolicy, SeatAllocator};
use ticketboss_testing::helpers::{init_test_tracing, test_event, test_reservation};
use ticketboss_testing::{GatedInventoryStore, InMemoryInventoryStore, InMemoryReservationStore};

fn allocator_for(
    event: Event,
    retry: RetryPolicy,
) -> (Arc<SeatAllocator>, InMemoryInventoryStore, InMemoryReservationStore) {
    init_test_tracing();
    let inventory = InMemoryInventoryStore::with_event(event.clone());
    let reservations = InMemoryReservationStore::new();
    let allocator = SeatAllocator::new(
        event.event_id,
        Arc::new(inventory.clone()),
        Arc::new(reservations.clone()),
    )
    .with_retry_policy(retry);
    (Arc::new(allocator), inventory, reservations)
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .base_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(20))
        .jitter(true)
        .build()
}

/// 100 concurrent single-seat requests for the last seat.
///
/// Exactly one wins; every loser sees either `InsufficientSeats` or, if it
/// lost the version race every time, `ConcurrencyConflict`.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_last_seat_concurrency_100_requests() {
    let mut event = test_event(500);
    event.available_seats = 1;
    let (allocator, inventory, reservations) = allocator_for(event.clone(), fast_retry(5));

    let handles: Vec<_> = (0..100)
        .map(|i| {
            let allocator = Arc::clone(&allocator);
            tokio::spawn(async move { allocator.reserve_seats(&format!("partner-{i}"), 1).await })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("Task panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one request gets the last seat");

    for result in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(
                result,
                ReservationError::InsufficientSeats { .. }
                    | ReservationError::ConcurrencyConflict { .. }
            ),
            "unexpected error: {result}"
        );
    }

    assert_eq!(inventory.snapshot(&event.event_id).unwrap().available_seats, 0);
    assert_eq!(reservations.len(), 1);
    // 499 seats were "held" before the test started; only the new one is on record
    let report = allocator.audit().await.unwrap();
    assert_eq!(report.drift, 499);
}

/// Many partners reserving 2 seats from a 50-seat pool.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_no_oversell_under_contention() {
    let event = test_event(50);
    let (allocator, inventory, reservations) = allocator_for(event.clone(), fast_retry(10));

    let handles: Vec<_> = (0..60)
        .map(|i| {
            let allocator = Arc::clone(&allocator);
            tokio::spawn(async move { allocator.reserve_seats(&format!("partner-{i}"), 2).await })
        })
        .collect();

    let successes = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("Task panicked"))
        .filter(Result::is_ok)
        .count();

    assert!(successes <= 25, "at most 25 blocks of 2 fit in 50 seats");
    let available = inventory.snapshot(&event.event_id).unwrap().available_seats;
    assert_eq!(available as usize, 50 - 2 * successes);
    assert_eq!(reservations.len(), successes);
    assert!(allocator.audit().await.unwrap().is_conserved());
}

/// Interleaved reserves and cancels keep the pool balanced.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_reserve_cancel_churn_conserves_seats() {
    let event = test_event(200);
    let (allocator, inventory, _reservations) = allocator_for(event.clone(), fast_retry(20));

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let allocator = Arc::clone(&allocator);
            tokio::spawn(async move {
                let seats = i64::from(i % 10 + 1);
                let Ok(confirmation) = allocator.reserve_seats(&format!("partner-{i}"), seats).await
                else {
                    return;
                };
                if i % 2 == 0 {
                    let _ = allocator.cancel(&confirmation.reservation_id).await;
                }
            })
        })
        .collect();

    for handle in futures::future::join_all(handles).await {
        handle.expect("Task panicked");
    }

    let report = allocator.audit().await.unwrap();
    assert!(report.is_conserved(), "drift after churn: {report:?}");
    assert!(inventory.snapshot(&event.event_id).unwrap().available_seats <= 200);
}

/// Several cancels of the same reservation at once.
///
/// Exactly one reports `Cancelled`; the seats come back exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_double_cancel_credits_once() {
    let event = test_event(100);
    let (allocator, inventory, reservations) = allocator_for(event.clone(), fast_retry(20));
    let confirmation = allocator.reserve_seats("partner-a", 6).await.unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let allocator = Arc::clone(&allocator);
            let reservation_id = confirmation.reservation_id.clone();
            tokio::spawn(async move { allocator.cancel(&reservation_id).await })
        })
        .collect();

    let outcomes: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("Task panicked").expect("cancel should not fail"))
        .collect();

    let cancelled = outcomes
        .iter()
        .filter(|o| **o == CancelOutcome::Cancelled)
        .count();
    assert_eq!(cancelled, 1);
    assert!(reservations.is_empty());
    assert_eq!(inventory.snapshot(&event.event_id).unwrap().available_seats, 100);
}

/// A second cancel and a reserve arriving while the first cancel's credit is
/// still in flight.
///
/// The first cancel has already claimed the record, so the second one finds
/// nothing and the pool never shows the seats twice.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_double_cancel_never_exposes_seats_twice() {
    init_test_tracing();
    let mut event = test_event(10);
    event.available_seats = 0;
    let event_id = event.event_id.clone();
    let inventory = InMemoryInventoryStore::with_event(event);
    let gated = Arc::new(GatedInventoryStore::new(inventory.clone()));
    let reservations = InMemoryReservationStore::new();
    let first = test_reservation("r-1", 5);
    reservations.put(first.clone());
    reservations.put(test_reservation("r-2", 5));
    let allocator = SeatAllocator::new(event_id.clone(), gated.clone(), Arc::new(reservations.clone()))
        .with_retry_policy(fast_retry(5));

    let in_flight = {
        let allocator = allocator.clone();
        let reservation_id = first.reservation_id.clone();
        tokio::spawn(async move { allocator.cancel(&reservation_id).await })
    };
    gated.arrived().await;

    assert_eq!(
        allocator.cancel(&first.reservation_id).await.unwrap(),
        CancelOutcome::NotFound
    );
    assert_eq!(
        allocator.reserve_seats("partner-late", 5).await.unwrap_err(),
        ReservationError::InsufficientSeats {
            requested: 5,
            available: 0
        }
    );
    // Record claimed, credit pending: seats are under-counted meanwhile.
    assert_eq!(allocator.audit().await.unwrap().drift, 5);

    gated.open(1);
    assert_eq!(
        in_flight.await.expect("Task panicked").unwrap(),
        CancelOutcome::Cancelled
    );

    let report = allocator.audit().await.unwrap();
    assert!(report.is_conserved(), "drift after double cancel: {report:?}");
    assert_eq!(inventory.snapshot(&event_id).unwrap().available_seats, 5);
    assert_eq!(reservations.len(), 1);
}
