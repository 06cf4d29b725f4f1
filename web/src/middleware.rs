//! Axum middleware for request tracking.
//!
//! # Flow
//!
//! 1. **Extract** the request id from the `X-Request-ID` header (or generate a UUID)
//! 2. **Store** it in request extensions as [`RequestId`]
//! 3. **Instrument** the rest of the stack with a span carrying `request_id`
//! 4. **Echo** it back in the response `X-Request-ID` header

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::fmt;
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the request id.
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Longest client-supplied id that is accepted as is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request id stored in request extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_header(value: Option<&HeaderValue>) -> Self {
        value
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty() && s.len() <= MAX_REQUEST_ID_LEN)
            .map_or_else(|| Self(Uuid::new_v4().to_string()), |s| Self(s.to_string()))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request-id middleware, installed with `axum::middleware::from_fn`.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .route("/reservations", get(event_summary))
///     .layer(axum::middleware::from_fn(request_id));
/// ```
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = RequestId::from_header(req.headers().get(&REQUEST_ID_HEADER));
    req.extensions_mut().insert(id.clone());

    let span = tracing::info_span!(
        "http_request",
        request_id = %id,
        method = %req.method(),
        uri = %req.uri(),
    );

    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), value);
    }

    response
}
