//! Reservation records backed by the `reservations` table.

use crate::database_error;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use ticketboss_core::{
    EventId, PartnerId, Reservation, ReservationId, ReservationStore, ReservationTally, SeatCount,
    StoreError, StoreFuture,
};

/// `PostgreSQL` reservation store.
#[derive(Clone)]
pub struct PostgresReservationStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct ReservationRow {
    reservation_id: String,
    partner_id: String,
    seats: i32,
    event_id: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let seats = u32::try_from(row.seats)
            .ok()
            .and_then(|n| SeatCount::try_from(n).ok())
            .ok_or_else(|| {
                StoreError::Serialization(format!(
                    "reservation {}: invalid seats {}",
                    row.reservation_id, row.seats
                ))
            })?;
        let partner_id = PartnerId::try_from(row.partner_id)
            .map_err(|e| StoreError::Serialization(format!("reservation {}: {e}", row.reservation_id)))?;

        Ok(Self {
            reservation_id: ReservationId::new(row.reservation_id),
            partner_id,
            seats,
            event_id: EventId::new(row.event_id),
            created_at: row.created_at,
        })
    }
}

impl PostgresReservationStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, reservation: Reservation) -> Result<(), StoreError> {
        let seats = i32::try_from(reservation.seats.value()).map_err(|_| {
            StoreError::Serialization(format!("seats {} out of range", reservation.seats))
        })?;

        let result = sqlx::query(
            r"
            INSERT INTO reservations (reservation_id, partner_id, seats, event_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(reservation.reservation_id.as_str())
        .bind(reservation.partner_id.as_str())
        .bind(seats)
        .bind(reservation.event_id.as_str())
        .bind(reservation.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                StoreError::DuplicateReservation(reservation.reservation_id),
            ),
            Err(e) => Err(database_error("create_reservation", &e)),
        }
    }

    async fn fetch(&self, reservation_id: &ReservationId) -> Result<Option<Reservation>, StoreError> {
        sqlx::query_as::<_, ReservationRow>(
            r"
            SELECT reservation_id, partner_id, seats, event_id, created_at
            FROM reservations
            WHERE reservation_id = $1
            ",
        )
        .bind(reservation_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("find_reservation", &e))?
        .map(Reservation::try_from)
        .transpose()
    }

    async fn delete(&self, reservation_id: &ReservationId) -> Result<bool, StoreError> {
        let deleted = sqlx::query("DELETE FROM reservations WHERE reservation_id = $1")
            .bind(reservation_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("delete_reservation", &e))?
            .rows_affected();
        Ok(deleted == 1)
    }

    async fn sum_for(&self, event_id: &EventId) -> Result<ReservationTally, StoreError> {
        let (count, seats): (i64, i64) = sqlx::query_as(
            r"
            SELECT COUNT(*)::BIGINT, COALESCE(SUM(seats), 0)::BIGINT
            FROM reservations
            WHERE event_id = $1
            ",
        )
        .bind(event_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error("tally_reservations", &e))?;

        Ok(ReservationTally {
            count: u64::try_from(count).unwrap_or_default(),
            seats: u64::try_from(seats).unwrap_or_default(),
        })
    }
}

impl ReservationStore for PostgresReservationStore {
    fn create(&self, reservation: Reservation) -> StoreFuture<'_, ()> {
        Box::pin(self.insert(reservation))
    }

    fn find_by_id<'a>(
        &'a self,
        reservation_id: &'a ReservationId,
    ) -> StoreFuture<'a, Option<Reservation>> {
        Box::pin(self.fetch(reservation_id))
    }

    fn delete_by_id<'a>(&'a self, reservation_id: &'a ReservationId) -> StoreFuture<'a, bool> {
        Box::pin(self.delete(reservation_id))
    }

    fn tally<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, ReservationTally> {
        Box::pin(self.sum_for(event_id))
    }
}
