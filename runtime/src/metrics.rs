//! Prometheus metrics for the seat allocator.
//!
//! The allocator records through the `metrics` facade, so counters are free
//! no-ops until a recorder is installed. [`MetricsRecorder::install`] wires up
//! the Prometheus exporter; the web layer serves [`MetricsRecorder::render`]
//! on `/metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use ticketboss_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//! let text = recorder.render();
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;
use ticketboss_core::{CancelOutcome, Operation, ReservationError};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Handle on the installed Prometheus recorder.
#[derive(Clone, Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), this succeeds
    /// without a handle and [`render`](Self::render) returns `None`.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Whether this instance owns the installed recorder.
    #[must_use]
    pub const fn is_installed(&self) -> bool {
        self.handle.is_some()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "ticketboss_reservations_confirmed_total",
        "Reservations whose debit and record both committed"
    );
    describe_counter!(
        "ticketboss_reservations_rejected_total",
        "Reserve calls that failed, by reason code"
    );
    describe_counter!(
        "ticketboss_cancellations_total",
        "Cancel calls, by outcome"
    );
    describe_counter!(
        "ticketboss_version_conflicts_total",
        "Conditional updates that lost the version race"
    );
    describe_counter!(
        "ticketboss_retry_exhausted_total",
        "Operations that gave up after the last attempt"
    );
    describe_counter!(
        "ticketboss_reconciliation_candidates_total",
        "Inventory writes left without their matching reservation write"
    );
    describe_histogram!(
        "ticketboss_operation_duration_seconds",
        "Time spent in reserve/cancel including backoff"
    );
}

/// Allocator metrics recorder.
pub struct AllocatorMetrics;

impl AllocatorMetrics {
    /// Record the result of a reserve call.
    pub fn record_reserve<T>(result: &Result<T, ReservationError>, duration: Duration) {
        match result {
            Ok(_) => counter!("ticketboss_reservations_confirmed_total").increment(1),
            Err(err) => {
                counter!("ticketboss_reservations_rejected_total", "reason" => err.code())
                    .increment(1);
            }
        }
        histogram!("ticketboss_operation_duration_seconds", "operation" => "reserve")
            .record(duration.as_secs_f64());
    }

    /// Record the result of a cancel call.
    pub fn record_cancel(result: &Result<CancelOutcome, ReservationError>, duration: Duration) {
        let outcome = match result {
            Ok(CancelOutcome::Cancelled) => "cancelled",
            Ok(CancelOutcome::NotFound) => "not_found",
            Err(err) => err.code(),
        };
        counter!("ticketboss_cancellations_total", "outcome" => outcome).increment(1);
        histogram!("ticketboss_operation_duration_seconds", "operation" => "cancel")
            .record(duration.as_secs_f64());
    }

    /// Record a lost version race.
    pub fn record_conflict(operation: Operation) {
        counter!("ticketboss_version_conflicts_total", "operation" => operation.as_str())
            .increment(1);
    }

    /// Record an exhausted retry loop.
    pub fn record_exhausted(operation: Operation) {
        counter!("ticketboss_retry_exhausted_total", "operation" => operation.as_str())
            .increment(1);
    }

    /// Record an inventory write stranded without its record write.
    pub fn record_reconciliation_candidate() {
        counter!("ticketboss_reconciliation_candidates_total").increment(1);
    }
}
