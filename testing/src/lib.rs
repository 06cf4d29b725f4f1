//! # TicketBoss Testing
//!
//! Testing utilities for the TicketBoss seat allocator.
//!
//! This crate provides:
//! - In-memory [`InventoryStore`](ticketboss_core::InventoryStore) and
//!   [`ReservationStore`](ticketboss_core::ReservationStore) backends
//! - Fault-injecting wrappers for the contention and partial-failure paths
//! - Mock implementations of Environment traits
//! - Property-based testing strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ticketboss_testing::{helpers, InMemoryInventoryStore, InMemoryReservationStore};
//! use ticketboss_runtime::SeatAllocator;
//!
//! #[tokio::test]
//! async fn test_reserve() {
//!     let event = helpers::test_event(500);
//!     let allocator = SeatAllocator::new(
//!         event.event_id.clone(),
//!         Arc::new(InMemoryInventoryStore::with_event(event)),
//!         Arc::new(InMemoryReservationStore::new()),
//!     );
//!
//!     let confirmation = allocator.reserve_seats("partner-a", 3).await.unwrap();
//!     assert_eq!(confirmation.seats.value(), 3);
//! }
//! ```

use chrono::{DateTime, Utc};
use ticketboss_core::environment::{Clock, IdGenerator};

pub mod faults;
pub mod stores;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};
    use ticketboss_core::ReservationId;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ticketboss_testing::mocks::FixedClock;
    /// use ticketboss_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Predictable ids: `res-1`, `res-2`, ...
    #[derive(Debug)]
    pub struct SequentialIdGenerator {
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Start at `res-1`.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(1),
            }
        }
    }

    impl Default for SequentialIdGenerator {
        fn default() -> Self {
            Self::new()
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_reservation_id(&self) -> ReservationId {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            ReservationId::new(format!("res-{n}"))
        }
    }

    /// Always hands out the same id, to force duplicate-key collisions.
    #[derive(Debug, Clone)]
    pub struct FixedIdGenerator(pub ReservationId);

    impl IdGenerator for FixedIdGenerator {
        fn next_reservation_id(&self) -> ReservationId {
            self.0.clone()
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    use super::mocks::test_clock;
    use ticketboss_core::environment::Clock;
    use ticketboss_core::{Event, EventId, PartnerId, Reservation, ReservationId, SeatCount};

    /// Event id used by [`test_event`].
    pub const TEST_EVENT_ID: &str = "test-event";

    /// Fresh event with `total_seats` all available.
    #[must_use]
    pub fn test_event(total_seats: u32) -> Event {
        Event::new(EventId::new(TEST_EVENT_ID), "Test Event", total_seats)
    }

    /// Seat count from a literal.
    ///
    /// # Panics
    ///
    /// If `n` is outside `[1, 10]`.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn seats(n: u32) -> SeatCount {
        SeatCount::try_from(n).expect("seat literal should be in range")
    }

    /// Reservation against [`test_event`] with a fixed timestamp.
    ///
    /// # Panics
    ///
    /// If `n` is outside `[1, 10]`.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_reservation(id: &str, n: u32) -> Reservation {
        Reservation {
            reservation_id: ReservationId::new(id),
            partner_id: PartnerId::try_from("partner-test".to_string())
                .expect("literal partner id is not blank"),
            seats: seats(n),
            event_id: EventId::new(TEST_EVENT_ID),
            created_at: test_clock().now(),
        }
    }

    /// Install a test-friendly tracing subscriber (once per process).
    ///
    /// Honors `RUST_LOG`; defaults to `warn`.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing strategies using proptest.
pub mod properties {
    use proptest::prelude::*;
    use ticketboss_core::{PartnerId, SeatCount};

    /// Any valid seat count, `1..=10`.
    pub fn seat_count() -> impl Strategy<Value = SeatCount> {
        (SeatCount::MIN..=SeatCount::MAX).prop_filter_map("in range", |n| SeatCount::try_from(n).ok())
    }

    /// Short non-blank partner ids.
    pub fn partner_id() -> impl Strategy<Value = PartnerId> {
        "[a-z][a-z0-9-]{0,11}".prop_filter_map("non-blank", |s| PartnerId::try_from(s).ok())
    }

    /// One step of a random reserve/cancel workload.
    #[derive(Debug, Clone)]
    pub enum Step {
        /// Reserve this many seats
        Reserve(SeatCount),
        /// Cancel the n-th (modulo) live reservation
        Cancel(usize),
    }

    /// Random workload step, biased toward reserves.
    pub fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            3 => seat_count().prop_map(Step::Reserve),
            1 => any::<usize>().prop_map(Step::Cancel),
        ]
    }
}

// Re-export commonly used items
pub use faults::{
    ContendedInventoryStore, DeleteFault, FaultyReservationStore, GatedInventoryStore,
};
pub use mocks::{FixedClock, FixedIdGenerator, SequentialIdGenerator, test_clock};
pub use stores::{InMemoryInventoryStore, InMemoryReservationStore};
