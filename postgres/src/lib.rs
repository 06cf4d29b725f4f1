//! `PostgreSQL` stores for TicketBoss.
//!
//! Implements [`InventoryStore`](ticketboss_core::InventoryStore) and
//! [`ReservationStore`](ticketboss_core::ReservationStore) on top of a shared
//! `sqlx` connection pool:
//!
//! - Compare-and-swap on the event version as a single guarded `UPDATE`
//! - Capacity bounds enforced both in the `UPDATE` predicate and by a `CHECK`
//!   constraint
//! - Reservation id uniqueness enforced by the primary key
//!
//! # Example
//!
//! ```ignore
//! use ticketboss_postgres::{PoolSettings, PostgresInventoryStore, PostgresReservationStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = ticketboss_postgres::connect("postgres://localhost/ticketboss", &PoolSettings::default()).await?;
//!     ticketboss_postgres::migrate(&pool).await?;
//!     let inventory = PostgresInventoryStore::new(pool.clone());
//!     let reservations = PostgresReservationStore::new(pool);
//!     Ok(())
//! }
//! ```

mod inventory;
mod reservations;

pub use inventory::PostgresInventoryStore;
pub use reservations::PostgresReservationStore;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use ticketboss_core::StoreError;

/// Connection pool sizing.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Maximum number of connections
    pub max_connections: u32,
    /// Connections kept open when idle
    pub min_connections: u32,
    /// How long to wait for a connection before failing
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the database is unreachable.
pub async fn connect(database_url: &str, settings: &PoolSettings) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.connect_timeout)
        .connect(database_url)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

    tracing::info!(
        max_connections = settings.max_connections,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}

/// Create the `events` and `reservations` tables if missing.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Map a driver error, counting it by operation.
fn database_error(operation: &'static str, err: &sqlx::Error) -> StoreError {
    metrics::counter!("ticketboss_store_errors_total", "operation" => operation).increment(1);
    tracing::error!(operation, error = %err, "Database operation failed");
    StoreError::Database(format!("{operation}: {err}"))
}
