//! Integration settings read by the pipeline on every delivery.
//!
//! The settings are owned by the host (configuration files, environment, or
//! an operator surface calling [`SharedSettings::replace`]). The pipeline
//! only ever reads a snapshot through [`SettingsProvider::current`], once per
//! webhook, so a change becomes visible to the next delivery without a
//! restart.
//!
//! Loose inputs are normalised at the deserialization boundary:
//! comma-separated tag and list strings become vectors, and bool-like
//! strings (`"1"`, `"on"`, ...) become `bool`.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while validating settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

// ============================================================================
// Settings
// ============================================================================

/// What to do with a delivery that carries no signature header while a
/// webhook secret is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingSignaturePolicy {
    /// Accept the delivery unverified and log a warning.
    #[default]
    Accept,
    /// Reject the delivery as an invalid signature.
    Reject,
}

/// Settings for one Eventbrite to CRM integration.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Eventbrite private token used as bearer credential.
    pub api_token: String,

    /// Shared secret for `x-eventbrite-signature`. Empty disables verification.
    pub webhook_secret: String,

    /// Tags applied to every synced contact.
    #[serde(deserialize_with = "deserialize_list")]
    pub default_tags: Vec<String>,

    /// CRM list identifiers every synced contact is added to.
    #[serde(deserialize_with = "deserialize_list")]
    pub default_lists: Vec<String>,

    /// Log raw webhook bodies and lower the default log level.
    #[serde(deserialize_with = "deserialize_flag")]
    pub debug_mode: bool,

    /// Handling of unsigned deliveries when a secret is configured.
    pub missing_signature: MissingSignaturePolicy,

    /// Hosts a delivery's `api_url` may point at. Empty allows any host.
    #[serde(deserialize_with = "deserialize_list")]
    pub allowed_api_hosts: Vec<String>,
}

impl SyncSettings {
    /// Check values that would otherwise fail deep inside a request.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.api_token.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(SettingsError::Invalid {
                key: "api_token".to_string(),
                message: "token must not contain whitespace or control characters".to_string(),
            });
        }

        if self.default_tags.iter().any(|t| t.contains(',')) {
            return Err(SettingsError::Invalid {
                key: "default_tags".to_string(),
                message: "tags must not contain commas".to_string(),
            });
        }

        if self.default_lists.iter().any(|l| l.contains(',')) {
            return Err(SettingsError::Invalid {
                key: "default_lists".to_string(),
                message: "list identifiers must not contain commas".to_string(),
            });
        }

        Ok(())
    }

    /// Defaults merged into every mapped contact.
    pub fn contact_defaults(&self) -> ContactDefaults {
        ContactDefaults {
            tags: self.default_tags.clone(),
            lists: self.default_lists.clone(),
        }
    }

    /// Whether the token may be sent to the host of `api_url`.
    pub fn allows_api_host(&self, api_url: &Url) -> bool {
        if self.allowed_api_hosts.is_empty() {
            return true;
        }

        match api_url.host_str() {
            Some(host) => self
                .allowed_api_hosts
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(host)),
            None => false,
        }
    }

    /// Whether signature verification is enforced at all.
    pub fn has_webhook_secret(&self) -> bool {
        !self.webhook_secret.is_empty()
    }
}

// Security: Don't expose secrets in debug output
impl fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSettings")
            .field("api_token", &redacted(&self.api_token))
            .field("webhook_secret", &redacted(&self.webhook_secret))
            .field("default_tags", &self.default_tags)
            .field("default_lists", &self.default_lists)
            .field("debug_mode", &self.debug_mode)
            .field("missing_signature", &self.missing_signature)
            .field("allowed_api_hosts", &self.allowed_api_hosts)
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() {
        "<EMPTY>"
    } else {
        "<REDACTED>"
    }
}

/// Tag and list defaults applied by the attendee mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDefaults {
    pub tags: Vec<String>,
    pub lists: Vec<String>,
}

// ============================================================================
// Boundary parsing
// ============================================================================

/// Split a comma-separated value into trimmed, non-empty entries.
///
/// ```rust
/// use eventbrite_sync_core::settings::parse_list;
///
/// assert_eq!(parse_list(" eventbrite, attendee ,,"), vec!["eventbrite", "attendee"]);
/// ```
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Interpret a bool-like configuration string.
///
/// Returns `None` for values that are neither truthy nor falsy.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListItem {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListInput {
    Text(String),
    Items(Vec<ListItem>),
}

fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match ListInput::deserialize(deserializer)? {
        ListInput::Text(text) => parse_list(&text),
        ListInput::Items(items) => items
            .into_iter()
            .map(|item| match item {
                ListItem::Text(text) => text.trim().to_string(),
                ListItem::Number(number) => number.to_string(),
            })
            .filter(|entry| !entry.is_empty())
            .collect(),
    };
    Ok(items)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagInput {
    Bool(bool),
    Number(i64),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match FlagInput::deserialize(deserializer)? {
        FlagInput::Bool(flag) => Ok(flag),
        FlagInput::Number(number) => Ok(number != 0),
        FlagInput::Text(text) => parse_flag(&text).ok_or_else(|| {
            serde::de::Error::custom(format!("'{}' is not a recognised boolean value", text))
        }),
    }
}

// ============================================================================
// Providers
// ============================================================================

/// Source of the settings snapshot used for one delivery.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Current settings. Called once per webhook, never cached by callers.
    async fn current(&self) -> SyncSettings;
}

/// Settings held in memory and replaceable at runtime.
#[derive(Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<SyncSettings>>,
}

impl SharedSettings {
    /// Create a store holding the given settings.
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Validate and swap in new settings.
    ///
    /// On error the previous settings stay in effect.
    pub async fn replace(&self, settings: SyncSettings) -> Result<(), SettingsError> {
        settings.validate()?;
        *self.inner.write().await = settings;
        tracing::info!("Integration settings replaced");
        Ok(())
    }
}

#[async_trait]
impl SettingsProvider for SharedSettings {
    async fn current(&self) -> SyncSettings {
        self.inner.read().await.clone()
    }
}

impl fmt::Debug for SharedSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSettings").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
