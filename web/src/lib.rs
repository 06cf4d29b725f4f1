//! HTTP shell for the TicketBoss seat allocator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← HTTP, JSON, request ids
//! │  - Request parsing                      │  ← Error → status mapping
//! │  - Response serialization               │  ← Tracing, metrics
//! ├─────────────────────────────────────────┤
//! │         SeatAllocator                   │
//! │  - Admission policy                     │  ← No I/O
//! │  - Version-guarded inventory updates    │  ← Bounded retry + backoff
//! │  - Compensation on partial failure      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ticketboss_web::{build_router, AppState};
//!
//! let state = AppState::new(allocator).with_metrics(recorder);
//! let app = build_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use config::{Config, ConfigError};
pub use error::AppError;
pub use middleware::{request_id, RequestId, REQUEST_ID_HEADER};
pub use router::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
