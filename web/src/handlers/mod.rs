//! HTTP request handlers.

pub mod health;
pub mod reservations;

pub use health::{health_check, metrics};
pub use reservations::{cancel_reservation, event_summary, reserve_seats};
