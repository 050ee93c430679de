//! Client-facing fault taxonomy
//!
//! Every variant carries an HTTP status and a message, and is the only kind of
//! failure ever written back to a peer. Failures that leave no reliable peer to
//! answer (disconnects, read errors) are modelled by
//! [`StreamEnd`](super::reader::StreamEnd) instead.

use super::response::StatusCode;

/// Faults surfaced to the client as an HTTP response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    /// Malformed header line or escalated multipart framing problem
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// Content-Type present without a usable Content-Length
    #[error("Length Required")]
    LengthRequired,
    /// Declared Content-Length above the configured maximum
    #[error("Request Entity Too Large: {declared} bytes exceeds limit of {limit}")]
    EntityTooLarge { declared: u64, limit: u64 },
    /// No handler registered for the requested URI
    #[error("Not Found")]
    NotFound,
    /// Any other fault; the detail is logged, never sent
    #[error("Internal Server Error: {0}")]
    Internal(String),
    /// Server binding or startup errors
    #[error("Server error: {0}")]
    Server(String),
}

impl HttpError {
    /// Status code written to the client for this fault
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) => StatusCode::BadRequest,
            HttpError::LengthRequired => StatusCode::LengthRequired,
            HttpError::EntityTooLarge { .. } => StatusCode::PayloadTooLarge,
            HttpError::NotFound => StatusCode::NotFound,
            HttpError::Internal(_) | HttpError::Server(_) => StatusCode::InternalServerError,
        }
    }

    /// Message written to the client; internal details stay server-side
    pub fn client_message(&self) -> String {
        match self {
            HttpError::BadRequest(msg) => msg.clone(),
            HttpError::Internal(_) | HttpError::Server(_) => {
                StatusCode::InternalServerError.reason_phrase().to_string()
            }
            other => other.status().reason_phrase().to_string(),
        }
    }

    /// Map an arbitrary handler error onto the taxonomy
    ///
    /// Errors that already are an [`HttpError`] keep their status; everything
    /// else collapses into a generic 500.
    pub fn from_handler_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<HttpError>() {
            Some(http) => http.clone(),
            None => HttpError::Internal(err.to_string()),
        }
    }
}
