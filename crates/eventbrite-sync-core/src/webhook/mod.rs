//! Webhook intake and dispatch.
//!
//! A delivery flows through the pipeline in a fixed order:
//!
//! 1. signature check against the configured secret
//! 2. envelope parsing (`api_url` is mandatory and must point at an allowed
//!    host when `allowed_api_hosts` is set)
//! 3. fetch of the referenced resource from the Eventbrite API
//! 4. routing on `config.action`
//! 5. attendee mapping and CRM upsert for the handled actions
//!
//! Actions other than `order.placed` and `attendee.updated` are acknowledged
//! as successful without touching the CRM. Eventbrite redelivers a webhook
//! that fails, so ignoring an action must never look like a failure.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::attendee::map_attendee;
use crate::crm::{CrmSyncClient, SyncResult};
use crate::error::SyncError;
use crate::fetcher::EventFetcher;
use crate::settings::{SettingsProvider, SyncSettings};
use crate::signature::{SignatureCheck, SignatureVerifier};

/// Action assumed when a delivery carries no `config.action`.
pub const DEFAULT_ACTION: &str = "order.placed";

/// Message returned when a contact was written to the CRM.
pub const SYNCED_MESSAGE: &str = "Contact synced to FluentCRM";

/// Message returned for deliveries whose action is not handled.
pub const IGNORED_MESSAGE: &str = "Webhook received but not processed";

// ============================================================================
// Envelope
// ============================================================================

/// Webhook action named in `config.action`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WebhookAction {
    #[default]
    OrderPlaced,
    AttendeeUpdated,
    Other(String),
}

impl WebhookAction {
    /// Parse an action name. Matching is exact.
    pub fn parse(action: &str) -> Self {
        match action {
            "order.placed" => Self::OrderPlaced,
            "attendee.updated" => Self::AttendeeUpdated,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire name of the action.
    pub fn as_str(&self) -> &str {
        match self {
            Self::OrderPlaced => DEFAULT_ACTION,
            Self::AttendeeUpdated => "attendee.updated",
            Self::Other(action) => action,
        }
    }

    /// Whether deliveries with this action are synced to the CRM.
    pub fn syncs_attendee(&self) -> bool {
        matches!(self, Self::OrderPlaced | Self::AttendeeUpdated)
    }
}

impl fmt::Display for WebhookAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `config` object of a delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookConfig {
    pub action: Option<String>,
}

/// Parsed webhook body: `{ api_url, config: { action } }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEnvelope {
    pub api_url: Url,
    pub config: WebhookConfig,
}

impl WebhookEnvelope {
    /// Parse a raw delivery body.
    ///
    /// Fields other than `api_url` and `config.action` are ignored. A
    /// `config.action` that is not a string counts as absent.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidPayload`] when the body is not JSON, or
    /// `api_url` is missing, empty, not a string or not an http(s) URL.
    pub fn from_slice(raw_body: &[u8]) -> Result<Self, SyncError> {
        let body: Value = serde_json::from_slice(raw_body).map_err(|_| missing_api_url())?;

        let api_url = body
            .get("api_url")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(missing_api_url)?;

        let api_url = Url::parse(api_url).map_err(|e| SyncError::InvalidPayload {
            message: format!("Invalid api_url in webhook payload: {}", e),
        })?;

        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidPayload {
                message: format!(
                    "Invalid api_url in webhook payload: unsupported scheme '{}'",
                    api_url.scheme()
                ),
            });
        }

        let action = body
            .get("config")
            .and_then(|config| config.get("action"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            api_url,
            config: WebhookConfig { action },
        })
    }

    /// The delivery's action, defaulting to `order.placed`.
    pub fn action(&self) -> WebhookAction {
        self.config
            .action
            .as_deref()
            .map(WebhookAction::parse)
            .unwrap_or_default()
    }
}

fn missing_api_url() -> SyncError {
    SyncError::InvalidPayload {
        message: "Missing api_url in webhook payload".to_string(),
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Successful response body: `{ success, message, data? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SyncResult>,
}

impl WebhookOutcome {
    /// Outcome of a delivery whose contact reached the CRM.
    pub fn synced(result: SyncResult) -> Self {
        Self {
            success: true,
            message: SYNCED_MESSAGE.to_string(),
            data: Some(result),
        }
    }

    /// Outcome of a delivery acknowledged without processing.
    pub fn ignored() -> Self {
        Self {
            success: true,
            message: IGNORED_MESSAGE.to_string(),
            data: None,
        }
    }

    /// Whether a contact was written.
    pub fn is_synced(&self) -> bool {
        self.data.is_some()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Runs a delivery through verification, fetch, mapping and CRM sync.
///
/// Built once at startup and shared by reference between requests. The
/// dispatcher holds no per-request state; settings are read from the
/// provider once per delivery.
pub struct WebhookDispatcher {
    settings: Arc<dyn SettingsProvider>,
    verifier: SignatureVerifier,
    fetcher: EventFetcher,
    sync: CrmSyncClient,
}

impl WebhookDispatcher {
    /// Wire the pipeline stages together.
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        fetcher: EventFetcher,
        sync: CrmSyncClient,
    ) -> Self {
        Self {
            settings,
            verifier: SignatureVerifier::new(),
            fetcher,
            sync,
        }
    }

    /// Whether the CRM can currently accept contacts.
    pub fn is_crm_active(&self) -> bool {
        self.sync.is_active()
    }

    /// Verify and process one delivery with a single settings snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidSignature`] before anything else is
    /// looked at, then any error of [`WebhookDispatcher::handle_with`].
    pub async fn receive(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, SyncError> {
        let settings = self.settings.current().await;
        self.verify(raw_body, signature, &settings)?;
        self.handle_with(raw_body, &settings).await
    }

    /// Check a delivery's signature header against the configured secret.
    pub fn verify(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
        settings: &SyncSettings,
    ) -> Result<SignatureCheck, SyncError> {
        self.verifier.verify(
            raw_body,
            signature,
            &settings.webhook_secret,
            settings.missing_signature,
        )
    }

    /// Process an already verified delivery with the current settings.
    pub async fn handle(&self, raw_body: &[u8]) -> Result<WebhookOutcome, SyncError> {
        let settings = self.settings.current().await;
        self.handle_with(raw_body, &settings).await
    }

    /// Process an already verified delivery.
    ///
    /// The resource is fetched before the action is routed, so a delivery
    /// with an unhandled action still costs one API call but never a CRM
    /// write.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidPayload`] for a body without a usable `api_url`,
    ///   or one outside `allowed_api_hosts`; no network call is made
    /// - fetch errors unchanged ([`SyncError::NoApiToken`],
    ///   [`SyncError::Transport`], [`SyncError::InvalidResponse`])
    /// - [`SyncError::NoEmail`] when the attendee has no email
    /// - [`SyncError::CrmNotActive`] or [`SyncError::CrmSync`] from the CRM
    #[instrument(skip(self, raw_body, settings), fields(body_len = raw_body.len()))]
    pub async fn handle_with(
        &self,
        raw_body: &[u8],
        settings: &SyncSettings,
    ) -> Result<WebhookOutcome, SyncError> {
        if settings.debug_mode {
            debug!(body = %String::from_utf8_lossy(raw_body), "Received webhook");
        }

        let envelope = WebhookEnvelope::from_slice(raw_body).map_err(|e| {
            warn!(error = %e, "Rejecting webhook payload");
            e
        })?;

        if !settings.allows_api_host(&envelope.api_url) {
            warn!(api_url = %envelope.api_url, "Rejecting api_url outside the allowed hosts");
            return Err(SyncError::InvalidPayload {
                message: format!(
                    "api_url host is not allowed: {}",
                    envelope.api_url.host_str().unwrap_or_default()
                ),
            });
        }

        let payload = self
            .fetcher
            .fetch(&envelope.api_url, &settings.api_token)
            .await
            .map_err(|e| {
                warn!(error = %e, "Error fetching Eventbrite data");
                e
            })?;

        let action = envelope.action();
        if !action.syncs_attendee() {
            info!(action = %action, "Unhandled webhook action");
            return Ok(WebhookOutcome::ignored());
        }

        let record = map_attendee(&payload, &settings.contact_defaults())?;
        let result = self.sync.sync_contact(&record).await?;

        info!(action = %action, contact_id = result.contact_id, "Webhook processed");
        Ok(WebhookOutcome::synced(result))
    }
}

impl fmt::Debug for WebhookDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookDispatcher")
            .field("fetcher", &self.fetcher)
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
