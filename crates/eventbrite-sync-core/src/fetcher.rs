//! Retrieval of full order and attendee data from the Eventbrite API.
//!
//! A webhook only names the resource that changed (`api_url`). The fetcher
//! performs one authenticated GET against that URL and hands back the
//! decoded JSON. There is no retry loop: Eventbrite redelivers a webhook
//! whose delivery failed, so a second attempt here would only duplicate
//! that mechanism.

use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::SyncError;

/// Default bound on a single Eventbrite API call.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

// ============================================================================
// Payload
// ============================================================================

/// Opaque JSON returned by the Eventbrite API.
///
/// Only `profile.{email, first_name, last_name, cell_phone}` is interpreted;
/// everything else is carried untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload(Value);

impl EventPayload {
    /// Wrap an already decoded JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The attendee `profile` object, if present.
    pub fn profile(&self) -> Option<&Map<String, Value>> {
        self.0.get("profile").and_then(Value::as_object)
    }

    /// A string field of the attendee profile.
    ///
    /// Non-string values are treated as absent.
    pub fn profile_str(&self, field: &str) -> Option<&str> {
        self.profile()
            .and_then(|profile| profile.get(field))
            .and_then(Value::as_str)
    }
}

impl From<Value> for EventPayload {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Configuration for [`EventFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Bound on the whole request, connect through body
    pub timeout: Duration,
    /// User agent sent to Eventbrite
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: concat!("eventbrite-sync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetcherConfig {
    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Authenticated single-shot client for Eventbrite resource URLs.
#[derive(Debug, Clone)]
pub struct EventFetcher {
    http_client: reqwest::Client,
}

impl EventFetcher {
    /// Build a fetcher with its own connection pool.
    ///
    /// # Errors
    ///
    /// Fails only when the TLS backend cannot be initialised.
    pub fn new(config: FetcherConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { http_client })
    }

    /// Fetch the resource a webhook points at.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Resource URL taken from the webhook envelope
    /// * `api_token` - Eventbrite private token from the current settings
    ///
    /// # Errors
    ///
    /// - [`SyncError::NoApiToken`] if `api_token` is empty; no request is made
    /// - [`SyncError::Transport`] if the API cannot be reached or times out
    /// - [`SyncError::InvalidResponse`] for non-success statuses and bodies
    ///   that are empty or not JSON
    #[instrument(skip(self, api_token), fields(api_url = %api_url))]
    pub async fn fetch(&self, api_url: &Url, api_token: &str) -> Result<EventPayload, SyncError> {
        if api_token.is_empty() {
            warn!("Eventbrite API token not configured");
            return Err(SyncError::NoApiToken);
        }

        let response = self
            .http_client
            .get(api_url.clone())
            .header("Authorization", format!("Bearer {}", api_token))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| SyncError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Eventbrite API returned an error status");
            return Err(SyncError::InvalidResponse {
                message: format!("API responded with status {}", status),
            });
        }

        let body = response.bytes().await.map_err(|e| SyncError::Transport {
            message: format!("Failed to read response body: {}", e),
        })?;

        debug!(size_bytes = body.len(), "Received Eventbrite API response");

        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(SyncError::InvalidResponse {
                message: "response body is empty".to_string(),
            });
        }

        let value: Value =
            serde_json::from_slice(&body).map_err(|e| SyncError::InvalidResponse {
                message: format!("response body is not valid JSON: {}", e),
            })?;

        if is_empty_document(&value) {
            return Err(SyncError::InvalidResponse {
                message: "response body holds no data".to_string(),
            });
        }

        Ok(EventPayload::new(value))
    }
}

/// `null`, `false`, `0`, `""`, `[]` and `{}` carry no usable data.
fn is_empty_document(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

#[cfg(test)]
#[path = "fetcher_tests.rs"]
mod tests;
