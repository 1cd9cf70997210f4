//! Error types for the webhook intake and sync pipeline.
//!
//! Every failure a webhook delivery can hit is a [`SyncError`] variant. Each
//! variant carries a stable wire code and an HTTP-equivalent status so the
//! HTTP layer can render it without knowing the pipeline internals.

use thiserror::Error;

use crate::crm::CrmError;

/// Standard result type for pipeline operations
pub type PipelineResult<T> = Result<T, SyncError>;

/// Pipeline failures with status mapping.
///
/// No variant is retried internally. The ticketing platform redelivers a
/// webhook that receives a 5xx response, so [`SyncError::is_transient`] is
/// informational only.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The signature header did not match the HMAC of the body (403).
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// The inbound body was not a usable webhook envelope (400).
    #[error("{message}")]
    InvalidPayload { message: String },

    /// No Eventbrite API token is configured (500).
    #[error("Eventbrite API token not configured")]
    NoApiToken,

    /// The Eventbrite API could not be reached (502).
    #[error("Request to Eventbrite API failed: {message}")]
    Transport { message: String },

    /// The Eventbrite API answered with something unusable (500).
    #[error("Invalid response from Eventbrite API: {message}")]
    InvalidResponse { message: String },

    /// The attendee profile has no email address (400).
    #[error("No email address found in attendee data")]
    NoEmail,

    /// The CRM integration is not active (500).
    #[error("FluentCRM is not active")]
    CrmNotActive,

    /// The CRM rejected or failed the upsert (500).
    #[error("{message}")]
    CrmSync { message: String },
}

impl SyncError {
    /// Stable machine-readable error code rendered in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidPayload { .. } => "invalid_data",
            Self::NoApiToken => "no_api_token",
            Self::Transport { .. } => "http_request_failed",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::NoEmail => "no_email",
            Self::CrmNotActive => "fluentcrm_not_active",
            Self::CrmSync { .. } => "fluentcrm_error",
        }
    }

    /// HTTP status code equivalent for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidSignature => 403,
            Self::InvalidPayload { .. } => 400,
            Self::NoApiToken => 500,
            Self::Transport { .. } => 502,
            Self::InvalidResponse { .. } => 500,
            Self::NoEmail => 400,
            Self::CrmNotActive => 500,
            Self::CrmSync { .. } => 500,
        }
    }

    /// Check if a redelivery of the same webhook could succeed.
    ///
    /// Configuration and payload problems are permanent until an operator
    /// or the sender changes something.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::InvalidSignature => false,
            Self::InvalidPayload { .. } => false,
            Self::NoApiToken => false,
            Self::Transport { .. } => true,
            Self::InvalidResponse { .. } => true,
            Self::NoEmail => false,
            Self::CrmNotActive => false,
            Self::CrmSync { .. } => true,
        }
    }
}

impl From<CrmError> for SyncError {
    fn from(error: CrmError) -> Self {
        match error {
            CrmError::NotActive => Self::CrmNotActive,
            other => Self::CrmSync {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
