//! Error types for web handlers.
//!
//! [`AppError`] bridges allocator errors and HTTP responses. Every failure
//! leaves the service as the same `{code, message}` JSON body.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use ticketboss_core::{ErrorKind, ReservationError, ValidationError};

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>) -> Result<Json<Summary>, AppError> {
///     let summary = state.allocator.event_summary().await?;
///     Ok(Json(summary.into()))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 with the `VALIDATION_ERROR` code.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// 404 with the `NOT_FOUND` code.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            message.into(),
            "NOT_FOUND".to_string(),
        )
    }

    /// 500 with a generic message.
    #[must_use]
    pub fn internal(code: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "An internal error occurred".to_string(),
            code.into(),
        )
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code of this error.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    error = %source,
                    "Internal server error"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        let code = err.code();
        if let ReservationError::Validation(inner) = &err {
            return Self::validation(inner.to_string());
        }
        match err.kind() {
            ErrorKind::Validation => Self::validation(err.to_string()),
            ErrorKind::Rejected => {
                Self::new(StatusCode::CONFLICT, err.to_string(), code.to_string())
            }
            ErrorKind::Conflict => Self::new(
                StatusCode::CONFLICT,
                "Too much contention, please retry".to_string(),
                code.to_string(),
            )
            .with_source(err.into()),
            ErrorKind::Internal => Self::internal(code).with_source(err.into()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("INTERNAL_SERVER_ERROR").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketboss_core::{EventId, Operation, StoreError};

    #[test]
    fn test_error_display() {
        let err = AppError::validation("seats must be an integer");
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] seats must be an integer");
    }

    #[test]
    fn test_validation_message_is_the_policy_message() {
        let app = AppError::from(ReservationError::Validation(ValidationError::EmptyPartnerId));
        assert_eq!(app.to_string(), "[VALIDATION_ERROR] partnerId is required");
    }

    #[test]
    fn test_reservation_error_statuses() {
        let cases = [
            (
                ReservationError::Validation(ValidationError::EmptyPartnerId),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                ReservationError::InsufficientSeats {
                    requested: 3,
                    available: 1,
                },
                StatusCode::CONFLICT,
                "INSUFFICIENT_SEATS",
            ),
            (
                ReservationError::ConcurrencyConflict {
                    operation: Operation::Reserve,
                    attempts: 5,
                },
                StatusCode::CONFLICT,
                "CONCURRENCY_CONFLICT",
            ),
            (
                ReservationError::EventNotFound(EventId::new("e")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "EVENT_NOT_FOUND",
            ),
            (
                ReservationError::Store(StoreError::Database("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_ERROR",
            ),
        ];

        for (err, status, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status(), status);
            assert_eq!(app.code(), code);
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let app = AppError::from(ReservationError::Store(StoreError::Database(
            "password authentication failed".into(),
        )));
        assert!(!app.to_string().contains("password"));
        assert!(std::error::Error::source(&app).is_some());
    }
}
