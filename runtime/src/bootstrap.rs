//! Startup seeding of the event record.

use ticketboss_core::{Event, InventoryStore, ReservationError, SeededEvent};

/// Make sure the event exists before the allocator serves traffic.
///
/// Inserts `seed` if no record with its id is present. An existing record is
/// left untouched, so restarting never resets `available_seats` or `version`.
///
/// # Errors
///
/// - `Store`: backend failure
pub async fn ensure_event(
    inventory: &dyn InventoryStore,
    seed: Event,
) -> Result<SeededEvent, ReservationError> {
    let seed_total = seed.total_seats;
    let seeded = inventory.insert_event_if_absent(seed).await?;
    let stored = &seeded.event;

    if seeded.created {
        tracing::info!(
            event_id = %stored.event_id,
            total_seats = stored.total_seats,
            "Event created"
        );
    } else {
        tracing::info!(
            event_id = %stored.event_id,
            available = stored.available_seats,
            version = %stored.version,
            "Event already initialized, keeping stored inventory"
        );
    }

    if stored.total_seats != seed_total {
        tracing::warn!(
            event_id = %stored.event_id,
            stored = stored.total_seats,
            configured = seed_total,
            "Configured capacity differs from stored capacity; stored value wins"
        );
    }

    Ok(seeded)
}
