//! Response types for the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error response body: `{code, message, data: {status}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub data: ErrorData,
}

/// Status detail of an [`ErrorResponse`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub status: u16,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` when the CRM accepts writes, `unhealthy` otherwise
    pub status: String,
    pub crm_active: bool,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    /// Build a response for the current CRM state.
    pub fn new(crm_active: bool) -> Self {
        Self {
            status: if crm_active { "healthy" } else { "unhealthy" }.to_string(),
            crm_active,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.crm_active
    }
}
