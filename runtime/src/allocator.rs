//! The concurrency-controlled seat allocator.
//!
//! Coordinates the inventory store and the reservation store so that a
//! reserve (debit + create record) and a cancel (delete record + credit)
//! behave as one logical step, without transactions.
//!
//! # Protocol
//!
//! ```text
//! reserve:  load event ─► capacity check ─► CAS(version, -seats) ─► create record
//!                ▲                                │ mismatch
//!                └──────── backoff(attempt) ◄─────┘
//!
//! cancel:   find record ─► delete record ─► load event ─► CAS(version, +seats)
//!                                             ▲                │ mismatch
//!                                             └─ backoff ◄─────┘
//! ```
//!
//! Both operations order their writes so that a failure in between can only
//! under-count available seats, never over-count them. A reserve debits
//! before creating its record; a cancel deletes its record before crediting.
//! The delete doubles as the claim on the reservation: a second cancel of
//! the same id finds nothing to delete and never reaches the inventory.
//!
//! When the second write fails (rather than the process dying) the allocator
//! undoes the first one: a stranded debit is credited back through the same
//! CAS loop, a stranded delete is undone by re-creating the record. If the
//! undo fails too, the stranded write is logged as a reconciliation
//! candidate.
//!
//! The allocator keeps no state between calls. The event is re-read on every
//! attempt, so a capacity check from an earlier attempt never authorizes a
//! later write.

use crate::metrics::AllocatorMetrics;
use crate::retry::RetryPolicy;
use std::sync::Arc;
use std::time::Instant;
use ticketboss_core::environment::{Clock, IdGenerator, SystemClock, UuidGenerator};
use ticketboss_core::{
    policy, CancelOutcome, ConservationReport, Event, EventId, EventSummary, InventoryStore,
    Operation, PartnerId, Reservation, ReservationConfirmation, ReservationError, ReservationId,
    ReservationStatus, ReservationStore, SeatCount, SeatDelta, StoreError,
};

/// Reserves and cancels blocks of seats against a single event.
///
/// Cheap to share: wrap in an `Arc` and call from any number of tasks.
#[derive(Clone)]
pub struct SeatAllocator {
    event_id: EventId,
    inventory: Arc<dyn InventoryStore>,
    reservations: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    retry: RetryPolicy,
}

impl SeatAllocator {
    /// Create an allocator for `event_id` with the system clock, UUID ids and
    /// the default retry policy.
    #[must_use]
    pub fn new(
        event_id: EventId,
        inventory: Arc<dyn InventoryStore>,
        reservations: Arc<dyn ReservationStore>,
    ) -> Self {
        Self {
            event_id,
            inventory,
            reservations,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the clock used for `created_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the reservation id generator.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Replace the retry policy.
    ///
    /// A policy with zero attempts still makes one.
    #[must_use]
    pub fn with_retry_policy(mut self, mut retry: RetryPolicy) -> Self {
        retry.max_attempts = retry.max_attempts.max(1);
        self.retry = retry;
        self
    }

    /// The event this allocator manages.
    #[must_use]
    pub const fn event_id(&self) -> &EventId {
        &self.event_id
    }

    /// The retry policy in effect.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Validate raw input, then reserve.
    ///
    /// # Errors
    ///
    /// - `Validation`: blank partner id or seats outside `[1, 10]` (no store touched)
    /// - everything [`reserve`](Self::reserve) returns
    pub async fn reserve_seats(
        &self,
        partner_id: &str,
        seats: i64,
    ) -> Result<ReservationConfirmation, ReservationError> {
        let (partner_id, seats) = policy::validate_reservation(partner_id, seats)?;
        self.reserve(partner_id, seats).await
    }

    /// Debit `seats` from the event and record the reservation.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`: the event record is missing (not retried)
    /// - `InsufficientSeats`: fewer than `seats` available at the latest read
    /// - `ConcurrencyConflict`: every attempt lost the version race
    /// - `DuplicateId`: the generated id already exists (debit is compensated)
    /// - `Store`: backend failure
    #[tracing::instrument(skip(self), fields(event_id = %self.event_id), name = "reserve_seats")]
    pub async fn reserve(
        &self,
        partner_id: PartnerId,
        seats: SeatCount,
    ) -> Result<ReservationConfirmation, ReservationError> {
        let started = Instant::now();
        let result = self.reserve_with_retry(partner_id, seats).await;
        AllocatorMetrics::record_reserve(&result, started.elapsed());
        result
    }

    async fn reserve_with_retry(
        &self,
        partner_id: PartnerId,
        seats: SeatCount,
    ) -> Result<ReservationConfirmation, ReservationError> {
        let delta = SeatDelta::debit(seats);

        for attempt in 0..self.retry.max_attempts {
            let event = self.load_event(&self.event_id).await?;

            if !event.can_reserve(seats) {
                tracing::debug!(
                    requested = seats.value(),
                    available = event.available_seats,
                    "Not enough seats left"
                );
                return Err(ReservationError::InsufficientSeats {
                    requested: seats.value(),
                    available: event.available_seats,
                });
            }

            let reservation_id = self.ids.next_reservation_id();
            tracing::debug!(
                attempt,
                version = %event.version,
                reservation_id = %reservation_id,
                "Attempting seat debit"
            );

            match self
                .inventory
                .conditional_update(&self.event_id, event.version, delta)
                .await
            {
                Ok(committed) => {
                    return self
                        .record_reservation(reservation_id, partner_id, delta, seats, &committed)
                        .await;
                }
                Err(err) if err.is_version_mismatch() => {
                    self.after_mismatch(Operation::Reserve, attempt, &err).await;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(self.exhausted(Operation::Reserve))
    }

    /// Second step of a reserve: the debit has committed, create the record.
    async fn record_reservation(
        &self,
        reservation_id: ReservationId,
        partner_id: PartnerId,
        delta: SeatDelta,
        seats: SeatCount,
        committed: &Event,
    ) -> Result<ReservationConfirmation, ReservationError> {
        let reservation = Reservation {
            reservation_id: reservation_id.clone(),
            partner_id,
            seats,
            event_id: committed.event_id.clone(),
            created_at: self.clock.now(),
        };

        match self.reservations.create(reservation).await {
            Ok(()) => {
                tracing::info!(
                    reservation_id = %reservation_id,
                    seats = seats.value(),
                    available = committed.available_seats,
                    version = %committed.version,
                    "Reservation confirmed"
                );
                Ok(ReservationConfirmation {
                    reservation_id,
                    seats,
                    status: ReservationStatus::Confirmed,
                })
            }
            Err(err) => {
                AllocatorMetrics::record_reconciliation_candidate();
                tracing::error!(
                    reservation_id = %reservation_id,
                    seats = seats.value(),
                    version = %committed.version,
                    error = %err,
                    "Seats debited but reservation record not created; reconciliation candidate"
                );
                self.compensate(&committed.event_id, delta.inverse(), &reservation_id)
                    .await;
                Err(err.into())
            }
        }
    }

    /// Validate the raw handle, then cancel.
    ///
    /// # Errors
    ///
    /// - `Validation`: blank reservation id
    /// - everything [`cancel`](Self::cancel) returns
    pub async fn cancel_reservation(
        &self,
        reservation_id: &str,
    ) -> Result<CancelOutcome, ReservationError> {
        let reservation_id = policy::validate_reservation_id(reservation_id)?;
        self.cancel(&reservation_id).await
    }

    /// Claim the reservation record, then credit its seats back.
    ///
    /// The record is deleted before the credit, so of two racing cancels of
    /// the same id only the one whose delete succeeds ever touches the
    /// inventory. Cancelling an unknown or already-cancelled id returns
    /// [`CancelOutcome::NotFound`] and leaves the inventory untouched.
    ///
    /// If the credit cannot commit, the record is put back so the
    /// reservation stays cancellable.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`: the reservation's event is missing (not retried)
    /// - `ConcurrencyConflict`: every credit attempt lost the version race
    /// - `Store`: backend failure
    #[tracing::instrument(skip(self), fields(event_id = %self.event_id), name = "cancel_reservation")]
    pub async fn cancel(
        &self,
        reservation_id: &ReservationId,
    ) -> Result<CancelOutcome, ReservationError> {
        let started = Instant::now();
        let result = self.cancel_with_retry(reservation_id).await;
        AllocatorMetrics::record_cancel(&result, started.elapsed());
        result
    }

    async fn cancel_with_retry(
        &self,
        reservation_id: &ReservationId,
    ) -> Result<CancelOutcome, ReservationError> {
        let Some(reservation) = self.reservations.find_by_id(reservation_id).await? else {
            tracing::debug!(reservation_id = %reservation_id, "Reservation not found");
            return Ok(CancelOutcome::NotFound);
        };

        if !self.reservations.delete_by_id(reservation_id).await? {
            tracing::debug!(
                reservation_id = %reservation_id,
                "Reservation claimed by a concurrent cancel"
            );
            return Ok(CancelOutcome::NotFound);
        }

        match self.credit_seats(&reservation).await {
            Ok(committed) => {
                tracing::info!(
                    reservation_id = %reservation_id,
                    seats = reservation.seats.value(),
                    available = committed.available_seats,
                    version = %committed.version,
                    "Reservation cancelled"
                );
                Ok(CancelOutcome::Cancelled)
            }
            Err(err) => {
                self.restore_record(reservation).await;
                Err(err)
            }
        }
    }

    /// Second step of a cancel: the record is claimed, credit the seats.
    async fn credit_seats(&self, reservation: &Reservation) -> Result<Event, ReservationError> {
        let delta = SeatDelta::credit(reservation.seats);

        for attempt in 0..self.retry.max_attempts {
            let event = self.load_event(&reservation.event_id).await?;
            tracing::debug!(
                attempt,
                version = %event.version,
                reservation_id = %reservation.reservation_id,
                "Attempting seat credit"
            );

            match self
                .inventory
                .conditional_update(&reservation.event_id, event.version, delta)
                .await
            {
                Ok(committed) => return Ok(committed),
                Err(err) if err.is_version_mismatch() => {
                    self.after_mismatch(Operation::Cancel, attempt, &err).await;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(self.exhausted(Operation::Cancel))
    }

    /// Put a claimed record back after its credit failed.
    async fn restore_record(&self, reservation: Reservation) {
        let reservation_id = reservation.reservation_id.clone();
        let seats = reservation.seats.value();

        match self.reservations.create(reservation).await {
            Ok(()) => {
                tracing::warn!(
                    reservation_id = %reservation_id,
                    "Seat credit failed; reservation record restored"
                );
            }
            Err(err) => {
                AllocatorMetrics::record_reconciliation_candidate();
                tracing::error!(
                    reservation_id = %reservation_id,
                    seats,
                    error = %err,
                    "Reservation record deleted but seats not credited; reconciliation candidate"
                );
            }
        }
    }

    /// Best-effort undo of a committed debit whose record could not be created.
    ///
    /// Runs the same CAS/backoff loop. Returns whether the undo committed.
    async fn compensate(
        &self,
        event_id: &EventId,
        delta: SeatDelta,
        reservation_id: &ReservationId,
    ) -> bool {
        for attempt in 0..self.retry.max_attempts {
            let event = match self.inventory.load_event(event_id).await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(err) => {
                    tracing::error!(error = %err, "Compensation could not load event");
                    break;
                }
            };

            match self
                .inventory
                .conditional_update(event_id, event.version, delta)
                .await
            {
                Ok(committed) => {
                    tracing::info!(
                        reservation_id = %reservation_id,
                        delta = %delta,
                        version = %committed.version,
                        "Compensating seat update committed"
                    );
                    return true;
                }
                Err(err) if err.is_version_mismatch() => {
                    if self.retry.has_attempts_after(attempt) {
                        self.retry.backoff(attempt).await;
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "Compensating seat update rejected");
                    break;
                }
            }
        }

        tracing::error!(
            event_id = %event_id,
            reservation_id = %reservation_id,
            delta = %delta,
            "Compensation failed; inventory needs reconciliation"
        );
        false
    }

    /// Read-only snapshot of the event plus its active reservation count.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`: the event record is missing
    /// - `Store`: backend failure
    pub async fn event_summary(&self) -> Result<EventSummary, ReservationError> {
        let event = self.load_event(&self.event_id).await?;
        let tally = self.reservations.tally(&event.event_id).await?;

        Ok(EventSummary {
            event_id: event.event_id,
            name: event.name,
            total_seats: event.total_seats,
            available_seats: event.available_seats,
            reservation_count: tally.count,
            version: event.version,
        })
    }

    /// Compare the seat counter with the reservation records.
    ///
    /// Read-only; a non-zero drift is logged but never repaired here.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`: the event record is missing
    /// - `Store`: backend failure
    pub async fn audit(&self) -> Result<ConservationReport, ReservationError> {
        let event = self.load_event(&self.event_id).await?;
        let tally = self.reservations.tally(&event.event_id).await?;
        let report = ConservationReport::new(&event, tally);

        if report.is_conserved() {
            tracing::debug!(
                available = report.available_seats,
                reserved = report.reserved_seats,
                "Seat conservation holds"
            );
        } else {
            tracing::warn!(
                event_id = %report.event_id,
                total = report.total_seats,
                available = report.available_seats,
                reserved = report.reserved_seats,
                drift = report.drift,
                "Seat conservation drift detected"
            );
        }

        Ok(report)
    }

    async fn load_event(&self, event_id: &EventId) -> Result<Event, ReservationError> {
        self.inventory
            .load_event(event_id)
            .await?
            .ok_or_else(|| ReservationError::EventNotFound(event_id.clone()))
    }

    async fn after_mismatch(&self, operation: Operation, attempt: u32, err: &StoreError) {
        AllocatorMetrics::record_conflict(operation);

        if self.retry.has_attempts_after(attempt) {
            let delay = self.retry.backoff_delay(attempt);
            tracing::warn!(
                %operation,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Version mismatch, retrying..."
            );
            tokio::time::sleep(delay).await;
        } else {
            tracing::warn!(%operation, attempt, error = %err, "Version mismatch on final attempt");
        }
    }

    fn exhausted(&self, operation: Operation) -> ReservationError {
        AllocatorMetrics::record_exhausted(operation);
        tracing::error!(
            %operation,
            attempts = self.retry.max_attempts,
            "Operation failed after max retries"
        );
        ReservationError::ConcurrencyConflict {
            operation,
            attempts: self.retry.max_attempts,
        }
    }
}

impl std::fmt::Debug for SeatAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeatAllocator")
            .field("event_id", &self.event_id)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
