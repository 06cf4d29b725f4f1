//! TicketBoss HTTP server.
//!
//! This binary:
//! - Loads configuration from the environment (and `.env`)
//! - Connects to `PostgreSQL` and runs migrations
//! - Seeds the event record if it does not exist yet
//! - Audits seat conservation once before taking traffic
//! - Serves the reservation API until Ctrl+C / SIGTERM
//!
//! # Usage
//!
//! ```bash
//! docker compose up -d postgres
//! cargo run --bin server
//! ```

use anyhow::Context;
use std::future::IntoFuture;
use std::sync::Arc;
use ticketboss_postgres::{PostgresInventoryStore, PostgresReservationStore};
use ticketboss_runtime::{ensure_event, MetricsRecorder, SeatAllocator};
use ticketboss_web::{build_router, AppState, Config};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ticketboss=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting TicketBoss server");

    // Load configuration
    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        event_id = %config.event.id,
        total_seats = config.event.total_seats,
        max_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );

    let mut metrics = MetricsRecorder::new();
    if config.metrics_enabled {
        metrics.install().context("failed to install metrics recorder")?;
    }

    // Storage
    let pool = ticketboss_postgres::connect(&config.database.url, &config.pool_settings())
        .await
        .context("failed to connect to PostgreSQL")?;
    ticketboss_postgres::migrate(&pool)
        .await
        .context("failed to run migrations")?;
    info!("Database ready");

    let inventory = Arc::new(PostgresInventoryStore::new(pool.clone()));
    let reservations = Arc::new(PostgresReservationStore::new(pool));

    let seeded = ensure_event(inventory.as_ref(), config.seed_event())
        .await
        .context("failed to initialize event")?;

    let allocator = SeatAllocator::new(seeded.event.event_id, inventory, reservations)
        .with_retry_policy(config.retry_policy());

    let report = allocator.audit().await.context("startup audit failed")?;
    info!(
        available = report.available_seats,
        reserved = report.reserved_seats,
        reservations = report.reservation_count,
        drift = report.drift,
        "Startup audit complete"
    );

    let app = build_router(AppState::new(allocator).with_metrics(metrics));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    // Run server with graceful shutdown, bounded by the drain timeout
    let (draining_tx, draining_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = draining_tx.send(());
    });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut server => {
            joined??;
        }
        Ok(()) = draining_rx => {
            let timeout = config.shutdown_timeout();
            match tokio::time::timeout(timeout, &mut server).await {
                Ok(joined) => joined??,
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "Shutdown timeout elapsed, dropping open connections");
                    server.abort();
                }
            }
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
