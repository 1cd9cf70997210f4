//! # Eventbrite Sync Core
//!
//! Domain logic for turning Eventbrite webhook deliveries into CRM contacts.
//!
//! The pipeline is assembled from plain values wired once at startup:
//!
//! - [`signature::SignatureVerifier`] authenticates a delivery
//! - [`webhook::WebhookDispatcher`] parses and routes it
//! - [`fetcher::EventFetcher`] loads the referenced order or attendee
//! - [`attendee::map_attendee`] turns the attendee profile into a contact
//! - [`crm::CrmSyncClient`] upserts the contact through a
//!   [`crm::ContactRepository`]
//!
//! Integration settings are read through [`settings::SettingsProvider`] on
//! every delivery and never cached by the pipeline.
//!
//! ## Usage
//!
//! ```rust
//! use eventbrite_sync_core::{webhook_url, DEFAULT_WEBHOOK_PATH};
//! use url::Url;
//!
//! let base = Url::parse("https://example.org/").unwrap();
//! assert_eq!(
//!     webhook_url(&base, DEFAULT_WEBHOOK_PATH),
//!     "https://example.org/eventbrite-fluentcrm/v1/webhook"
//! );
//! ```

use url::Url;

pub mod attendee;
pub mod crm;
pub mod error;
pub mod fetcher;
pub mod settings;
pub mod signature;
pub mod webhook;

pub use attendee::{map_attendee, ContactRecord};
pub use crm::{ContactRepository, CrmContact, CrmError, CrmSyncClient, SyncResult};
pub use error::{PipelineResult, SyncError};
pub use fetcher::{EventFetcher, EventPayload, FetcherConfig};
pub use settings::{
    ContactDefaults, MissingSignaturePolicy, SettingsProvider, SharedSettings, SyncSettings,
};
pub use signature::{sign_payload, SignatureCheck, SignatureVerifier, SIGNATURE_HEADER};
pub use webhook::{WebhookAction, WebhookDispatcher, WebhookEnvelope, WebhookOutcome};

/// Route Eventbrite deliveries are posted to unless configured otherwise.
pub const DEFAULT_WEBHOOK_PATH: &str = "/eventbrite-fluentcrm/v1/webhook";

/// Public URL to register with Eventbrite for a deployment reachable at `base`.
///
/// Any path already on `base` is kept, so a service mounted below a prefix
/// gets the prefixed URL.
pub fn webhook_url(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
