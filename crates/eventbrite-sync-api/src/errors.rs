//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use eventbrite_sync_core::SyncError;
use tracing::{error, warn};

use crate::responses::{ErrorData, ErrorResponse};

/// Webhook handler errors with HTTP status code mapping
///
/// Every pipeline failure is rendered as `{code, message, data: {status}}`
/// with the status carried by the [`SyncError`] variant:
///
/// - `400 Bad Request`: unusable payload or attendee without email
/// - `403 Forbidden`: signature mismatch
/// - `500 Internal Server Error`: configuration, CRM and API response problems
/// - `502 Bad Gateway`: the Eventbrite API could not be reached
/// - `504 Gateway Timeout`: the delivery outran the request deadline
///
/// Eventbrite redelivers on any 5xx, which is the only retry mechanism.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Pipeline failure with its own status mapping
    #[error(transparent)]
    Pipeline(#[from] SyncError),

    /// The signature header is not valid UTF-8
    ///
    /// Maps to: `403 Forbidden`, reported as `invalid_signature`
    #[error("Signature header is not valid text")]
    MalformedSignatureHeader,

    /// Processing did not finish within `server.timeout_seconds`
    ///
    /// Maps to: `504 Gateway Timeout`, so the sender redelivers
    #[error("Webhook processing exceeded the {seconds}s request deadline")]
    Timeout { seconds: u64 },
}

impl WebhookHandlerError {
    /// Stable error code rendered in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Pipeline(e) => e.code(),
            Self::MalformedSignatureHeader => "invalid_signature",
            Self::Timeout { .. } => "request_timeout",
        }
    }

    /// Whether a redelivery of the same webhook could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Pipeline(e) => e.is_transient(),
            Self::MalformedSignatureHeader => false,
            Self::Timeout { .. } => true,
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        let status = match self {
            Self::Pipeline(e) => e.status_code(),
            Self::MalformedSignatureHeader => 403,
            Self::Timeout { .. } => 504,
        };
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let transient = self.is_transient();

        if status.is_server_error() {
            error!(
                code = code,
                status = status.as_u16(),
                transient = transient,
                error = %self,
                "Webhook processing failed"
            );
        } else {
            warn!(code = code, status = status.as_u16(), error = %self, "Webhook rejected");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message: self.to_string(),
            data: ErrorData {
                status: status.as_u16(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
