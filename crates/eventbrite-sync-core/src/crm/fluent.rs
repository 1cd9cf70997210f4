//! FluentCRM REST API adapter.
//!
//! Contacts are written with `POST /wp-json/fluent-crm/v2/subscribers` and
//! `__force_update: "yes"`, which makes FluentCRM update the subscriber that
//! already has the email instead of refusing a duplicate. Requests are
//! authenticated with a WordPress application password over HTTP basic auth.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};
use url::Url;

use super::{ContactRepository, CrmContact, CrmError};
use crate::attendee::ContactRecord;

/// REST route of the FluentCRM subscribers collection.
pub const SUBSCRIBERS_PATH: &str = "wp-json/fluent-crm/v2/subscribers";

/// Connection settings for a FluentCRM installation.
#[derive(Clone)]
pub struct FluentCrmConfig {
    /// Root URL of the WordPress site, e.g. `https://example.org/`
    pub base_url: Url,
    /// WordPress user owning the application password
    pub username: String,
    /// WordPress application password
    pub application_password: String,
    /// Bound on a single CRM call
    pub timeout: Duration,
    /// Whether the integration accepts writes
    pub enabled: bool,
}

impl FluentCrmConfig {
    /// Create a configuration with a 15 second timeout.
    pub fn new(
        base_url: Url,
        username: impl Into<String>,
        application_password: impl Into<String>,
    ) -> Self {
        Self {
            base_url,
            username: username.into(),
            application_password: application_password.into(),
            timeout: Duration::from_secs(15),
            enabled: true,
        }
    }

    /// Full URL of the subscribers endpoint.
    pub fn subscribers_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            SUBSCRIBERS_PATH
        )
    }
}

// Security: Don't expose secrets in debug output
impl std::fmt::Debug for FluentCrmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluentCrmConfig")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("application_password", &"<REDACTED>")
            .field("timeout", &self.timeout)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    #[serde(flatten)]
    record: &'a ContactRecord,
    #[serde(rename = "__force_update")]
    force_update: &'static str,
}

#[derive(Deserialize)]
struct UpsertResponse {
    contact: SubscriberBody,
}

#[derive(Deserialize)]
struct SubscriberBody {
    #[serde(deserialize_with = "deserialize_id")]
    id: u64,
    email: String,
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// [`ContactRepository`] backed by the FluentCRM REST API.
#[derive(Debug, Clone)]
pub struct FluentCrmClient {
    http_client: reqwest::Client,
    config: FluentCrmConfig,
}

impl FluentCrmClient {
    /// Build a client with its own connection pool.
    pub fn new(config: FluentCrmConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &FluentCrmConfig {
        &self.config
    }
}

#[async_trait]
impl ContactRepository for FluentCrmClient {
    fn is_active(&self) -> bool {
        self.config.enabled
    }

    #[instrument(skip(self, record))]
    async fn create_or_update(&self, record: &ContactRecord) -> Result<CrmContact, CrmError> {
        let response = self
            .http_client
            .post(self.config.subscribers_url())
            .basic_auth(&self.config.username, Some(&self.config.application_password))
            .json(&UpsertRequest {
                record,
                force_update: "yes",
            })
            .send()
            .await
            .map_err(|e| CrmError::Unavailable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(
                        status = status.as_u16(),
                        error = %e,
                        "Failed to read FluentCRM error body"
                    );
                    String::new()
                }
            };
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| truncate(&body, 200));
            warn!(status = status.as_u16(), "FluentCRM rejected contact");
            return Err(CrmError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .json::<UpsertResponse>()
            .await
            .map_err(|e| CrmError::InvalidResponse {
                message: format!("Failed to parse subscriber response: {}", e),
            })?;

        Ok(CrmContact {
            id: body.contact.id,
            email: body.contact.email,
            status: body.contact.status,
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// FluentCRM returns ids as numbers or numeric strings depending on version.
fn deserialize_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    match Id::deserialize(deserializer)? {
        Id::Number(id) => Ok(id),
        Id::Text(text) => text
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid contact id '{}'", text))),
    }
}

#[cfg(test)]
#[path = "fluent_tests.rs"]
mod tests;
