//! Application state for Axum handlers.

use std::sync::Arc;
use ticketboss_runtime::{MetricsRecorder, SeatAllocator};

/// State shared across all HTTP handlers.
///
/// Cloned per request by axum, so everything inside is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Allocator for the managed event
    pub allocator: Arc<SeatAllocator>,
    /// Prometheus handle; empty when metrics are disabled
    pub metrics: MetricsRecorder,
}

impl AppState {
    /// Create state without a metrics handle.
    #[must_use]
    pub fn new(allocator: SeatAllocator) -> Self {
        Self {
            allocator: Arc::new(allocator),
            metrics: MetricsRecorder::new(),
        }
    }

    /// Serve `/metrics` from this recorder.
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = metrics;
        self
    }
}
