//! Token gate error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Authentication and authorization failures render identically (403 with
//! the same body) so a client cannot tell which check rejected it. Details
//! are logged server-side only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned for every 403 response.
const ACCESS_DENIED: &str = "Access denied";

/// Token gate error type.
///
/// Maps to HTTP status codes:
/// - MalformedRequest: 400 Bad Request
/// - Unauthenticated, Forbidden: 403 Forbidden (identical body)
/// - Configuration: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum GateError {
    /// Startup-time failure: issuer discovery, key resolution, bad config.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing or wrongly shaped Authorization header.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// No verifier accepted the presented token.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Valid identity without the required group membership.
    #[error("Forbidden")]
    Forbidden,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GateError::Configuration(reason) => {
                tracing::error!(target: "gate.errors", reason = %reason, "Configuration error reached a response");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            GateError::MalformedRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            GateError::Unauthenticated | GateError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                ACCESS_DENIED.to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}
