//! # TicketBoss Runtime
//!
//! The seat allocator and the machinery around it.
//!
//! ## Core Components
//!
//! - **[`SeatAllocator`]**: reserve/cancel against one event using an
//!   optimistic compare-and-swap on the event version
//! - **[`RetryPolicy`]**: bounded attempts with exponential backoff between
//!   version mismatches
//! - **[`metrics`]**: Prometheus counters and histograms for every outcome
//! - **[`ensure_event`]**: idempotent seeding at startup
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ticketboss_core::EventId;
//! use ticketboss_runtime::SeatAllocator;
//!
//! let allocator = SeatAllocator::new(EventId::new("node-meetup-2025"), inventory, reservations);
//!
//! let confirmation = allocator.reserve_seats("partner-a", 3).await?;
//! let outcome = allocator.cancel(&confirmation.reservation_id).await?;
//! assert!(outcome.is_cancelled());
//! ```

/// The concurrency-controlled allocator
pub mod allocator;

/// Event seeding at startup
pub mod bootstrap;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

pub use allocator::SeatAllocator;
pub use bootstrap::ensure_event;
pub use metrics::{AllocatorMetrics, MetricsError, MetricsRecorder};
pub use retry::{RetryPolicy, RetryPolicyBuilder};
