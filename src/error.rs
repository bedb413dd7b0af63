//! Error types for the admission gateway.
//!
//! Two layers are kept apart:
//! - [`ReviewError`] covers a single admission request and maps onto an HTTP status.
//! - [`Error`] covers the process itself (TLS material, listener I/O).

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Error raised while handling one admission review request
#[derive(Error, Debug)]
pub enum ReviewError {
    /// Transport-level precondition failure (body unreadable, empty, wrong content type)
    #[error("{0}")]
    BadRequest(String),

    /// The body could not be decoded into an AdmissionReview
    #[error("{0}")]
    Deserialization(String),

    /// The envelope is valid but its embedded object is not
    #[error("could not decode request object: {message}")]
    Object {
        uid: String,
        api_version: String,
        message: String,
    },

    /// The response envelope could not be serialized
    #[error("could not encode response: {0}")]
    Encode(String),
}

impl ReviewError {
    /// Short machine-readable label, used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ReviewError::BadRequest(_) => "BadRequest",
            ReviewError::Deserialization(_) | ReviewError::Object { .. } => {
                "DeserializationError"
            }
            ReviewError::Encode(_) => "EncodeError",
        }
    }

    /// HTTP status this error surfaces as when it aborts a request
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReviewError::BadRequest(_)
            | ReviewError::Deserialization(_)
            | ReviewError::Object { .. } => StatusCode::BAD_REQUEST,
            ReviewError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ReviewError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Process-level error
#[derive(Error, Debug)]
pub enum Error {
    /// TLS certificate or key could not be loaded
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Listener failure
    #[error("Webhook server error: {0}")]
    Server(#[from] std::io::Error),

    /// Invalid startup configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for process-level operations
pub type Result<T> = std::result::Result<T, Error>;
