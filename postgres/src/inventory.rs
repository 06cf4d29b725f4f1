//! Event inventory backed by the `events` table.

use crate::database_error;
use sqlx::{FromRow, PgPool};
use ticketboss_core::{
    Event, EventId, InventoryStore, SeatDelta, SeededEvent, StoreError, StoreFuture, Version,
};

/// `PostgreSQL` inventory store.
///
/// The compare-and-swap is one `UPDATE ... WHERE version = $expected`
/// statement, so it is atomic under any isolation level.
#[derive(Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct EventRow {
    event_id: String,
    name: String,
    total_seats: i32,
    available_seats: i32,
    version: i64,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let decode = |field: &str, value: i64| {
            StoreError::Serialization(format!("event {}: invalid {field} {value}", row.event_id))
        };
        let total_seats = u32::try_from(row.total_seats)
            .map_err(|_| decode("total_seats", i64::from(row.total_seats)))?;
        let available_seats = u32::try_from(row.available_seats)
            .map_err(|_| decode("available_seats", i64::from(row.available_seats)))?;
        let version = u64::try_from(row.version).map_err(|_| decode("version", row.version))?;

        Ok(Self {
            event_id: EventId::new(row.event_id),
            name: row.name,
            total_seats,
            available_seats,
            version: Version::new(version),
        })
    }
}

impl PostgresInventoryStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, event_id: &EventId) -> Result<Option<Event>, StoreError> {
        sqlx::query_as::<_, EventRow>(
            r"
            SELECT event_id, name, total_seats, available_seats, version
            FROM events
            WHERE event_id = $1
            ",
        )
        .bind(event_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("load_event", &e))?
        .map(Event::try_from)
        .transpose()
    }

    async fn compare_and_apply(
        &self,
        event_id: &EventId,
        expected: Version,
        delta: SeatDelta,
    ) -> Result<Event, StoreError> {
        let expected_version = i64::try_from(expected.value())
            .map_err(|_| StoreError::Serialization(format!("version {expected} out of range")))?;
        let change = i32::try_from(delta.value())
            .map_err(|_| StoreError::Serialization(format!("seat delta {delta} out of range")))?;

        let updated = sqlx::query_as::<_, EventRow>(
            r"
            UPDATE events
            SET available_seats = available_seats + $3,
                version = version + 1
            WHERE event_id = $1
              AND version = $2
              AND available_seats + $3 BETWEEN 0 AND total_seats
            RETURNING event_id, name, total_seats, available_seats, version
            ",
        )
        .bind(event_id.as_str())
        .bind(expected_version)
        .bind(change)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("conditional_update", &e))?;

        if let Some(row) = updated {
            return Event::try_from(row);
        }

        // Nothing matched: find out which guard rejected the write.
        let current = self
            .fetch(event_id)
            .await?
            .ok_or_else(|| StoreError::EventNotFound(event_id.clone()))?;

        if current.version != expected {
            return Err(StoreError::VersionMismatch {
                event_id: event_id.clone(),
                expected,
                actual: current.version,
            });
        }

        Err(StoreError::CapacityViolation {
            event_id: event_id.clone(),
            available: current.available_seats,
            delta,
        })
    }

    async fn insert_absent(&self, event: Event) -> Result<SeededEvent, StoreError> {
        let total = i32::try_from(event.total_seats)
            .map_err(|_| StoreError::Serialization(format!("total_seats {} out of range", event.total_seats)))?;
        let available = i32::try_from(event.available_seats).map_err(|_| {
            StoreError::Serialization(format!("available_seats {} out of range", event.available_seats))
        })?;
        let version = i64::try_from(event.version.value())
            .map_err(|_| StoreError::Serialization(format!("version {} out of range", event.version)))?;

        let inserted = sqlx::query(
            r"
            INSERT INTO events (event_id, name, total_seats, available_seats, version)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_id) DO NOTHING
            ",
        )
        .bind(event.event_id.as_str())
        .bind(&event.name)
        .bind(total)
        .bind(available)
        .bind(version)
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("insert_event", &e))?
        .rows_affected();

        let stored = self
            .fetch(&event.event_id)
            .await?
            .ok_or_else(|| StoreError::EventNotFound(event.event_id.clone()))?;

        Ok(SeededEvent {
            event: stored,
            created: inserted == 1,
        })
    }
}

impl InventoryStore for PostgresInventoryStore {
    fn load_event<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, Option<Event>> {
        Box::pin(self.fetch(event_id))
    }

    fn conditional_update<'a>(
        &'a self,
        event_id: &'a EventId,
        expected: Version,
        delta: SeatDelta,
    ) -> StoreFuture<'a, Event> {
        Box::pin(self.compare_and_apply(event_id, expected, delta))
    }

    fn insert_event_if_absent(&self, event: Event) -> StoreFuture<'_, SeededEvent> {
        Box::pin(self.insert_absent(event))
    }
}
