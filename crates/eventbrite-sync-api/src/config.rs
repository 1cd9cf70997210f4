//! Configuration types for the HTTP service

use eventbrite_sync_core::crm::{
    ContactRepository, FluentCrmClient, FluentCrmConfig, InMemoryContactRepository,
};
use eventbrite_sync_core::{FetcherConfig, SyncSettings, DEFAULT_WEBHOOK_PATH};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::errors::ConfigError;

/// Environment variable naming an extra configuration file.
pub const CONFIG_FILE_ENV: &str = "EBS_CONFIG_FILE";

/// Prefix of configuration environment variables, e.g. `EBS__SERVER__PORT`.
pub const ENV_PREFIX: &str = "EBS";

/// Routes served by the service itself, unavailable to the webhook.
const RESERVED_PATHS: [&str; 2] = ["/health", "/metrics"];

/// Service configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Webhook endpoint settings
    pub webhook: WebhookConfig,

    /// Integration settings handed to the pipeline
    pub sync: SyncSettings,

    /// Eventbrite API client settings
    pub fetch: FetchConfig,

    /// CRM connection; the service does not start without one
    pub crm: Option<CrmConfig>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Load configuration from the standard layered sources.
    ///
    /// Sources, later ones overriding earlier ones:
    ///
    /// 1. `/etc/eventbrite-sync/service.yaml`
    /// 2. `./config/service.yaml`
    /// 3. `explicit_path`, required when given
    /// 4. environment variables `EBS__SECTION__KEY`
    ///
    /// Every field has a default, so missing files are not an error. A file
    /// or variable that does not deserialize is.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(
                config::File::with_name("/etc/eventbrite-sync/service")
                    .required(false)
                    .format(config::FileFormat::Yaml),
            )
            .add_source(
                config::File::with_name("config/service")
                    .required(false)
                    .format(config::FileFormat::Yaml),
            );

        if let Some(path) = explicit_path {
            builder = builder.add_source(
                config::File::from(path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse a YAML document without consulting files or the environment.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Check the configuration as a whole.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.webhook.validate()?;
        self.fetch.validate()?;
        self.logging.validate()?;

        self.sync.validate().map_err(|e| ConfigError::Invalid {
            message: format!("sync: {}", e),
        })?;

        match &self.crm {
            Some(crm) => crm.validate(),
            None => Err(ConfigError::Missing {
                key: "crm".to_string(),
            }),
        }
    }

    /// The CRM section, or the error the service refuses to start with.
    pub fn crm(&self) -> Result<&CrmConfig, ConfigError> {
        self.crm.as_ref().ok_or_else(|| ConfigError::Missing {
            key: "crm".to_string(),
        })
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Overall deadline for one request in seconds
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 30,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(invalid("server.host must not be empty"));
        }
        if self.timeout_seconds == 0 {
            return Err(invalid("server.timeout_seconds must be greater than zero"));
        }
        if self.max_body_size == 0 {
            return Err(invalid("server.max_body_size must be greater than zero"));
        }
        Ok(())
    }

    /// Overall request deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Webhook endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Route Eventbrite posts deliveries to
    pub endpoint_path: String,

    /// Public base URL of the deployment, used to log the URL to register
    pub public_base_url: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: DEFAULT_WEBHOOK_PATH.to_string(),
            public_base_url: None,
        }
    }
}

impl WebhookConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.endpoint_path.starts_with('/') {
            return Err(invalid(format!(
                "webhook.endpoint_path '{}' must start with '/'",
                self.endpoint_path
            )));
        }
        if RESERVED_PATHS.contains(&self.endpoint_path.as_str()) {
            return Err(invalid(format!(
                "webhook.endpoint_path '{}' is reserved",
                self.endpoint_path
            )));
        }
        if let Some(base) = &self.public_base_url {
            parse_http_url("webhook.public_base_url", base)?;
        }
        Ok(())
    }
}

/// Eventbrite API client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Bound on one API call in seconds
    pub timeout_seconds: u64,

    /// User agent sent to the API
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 15,
            user_agent: None,
        }
    }
}

impl FetchConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_seconds == 0 {
            return Err(invalid("fetch.timeout_seconds must be greater than zero"));
        }
        Ok(())
    }

    /// Fetcher settings for this configuration.
    pub fn fetcher_config(&self) -> FetcherConfig {
        let config = FetcherConfig::default().with_timeout(Duration::from_secs(self.timeout_seconds));
        match &self.user_agent {
            Some(user_agent) => config.with_user_agent(user_agent.clone()),
            None => config,
        }
    }
}

/// CRM connection configuration, selected by `kind`.
#[derive(Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CrmConfig {
    /// FluentCRM REST API of a WordPress site.
    FluentCrm {
        base_url: String,
        username: String,
        application_password: String,
        #[serde(default = "default_crm_timeout")]
        timeout_seconds: u64,
        #[serde(default = "default_enabled")]
        enabled: bool,
    },

    /// Contacts kept in process memory. Lost on restart.
    Memory,
}

fn default_crm_timeout() -> u64 {
    15
}

fn default_enabled() -> bool {
    true
}

impl CrmConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::FluentCrm {
                base_url,
                username,
                application_password,
                timeout_seconds,
                ..
            } => {
                parse_http_url("crm.base_url", base_url)?;
                if username.trim().is_empty() {
                    return Err(invalid("crm.username must not be empty"));
                }
                if application_password.is_empty() {
                    return Err(invalid("crm.application_password must not be empty"));
                }
                if *timeout_seconds == 0 {
                    return Err(invalid("crm.timeout_seconds must be greater than zero"));
                }
                Ok(())
            }
            Self::Memory => Ok(()),
        }
    }

    /// Short name of the CRM backend.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FluentCrm { .. } => "fluentcrm",
            Self::Memory => "memory",
        }
    }

    /// Build the contact repository this section describes.
    pub fn connect(&self) -> Result<Arc<dyn ContactRepository>, ConfigError> {
        match self {
            Self::FluentCrm {
                base_url,
                username,
                application_password,
                timeout_seconds,
                enabled,
            } => {
                let mut config = FluentCrmConfig::new(
                    parse_http_url("crm.base_url", base_url)?,
                    username.clone(),
                    application_password.clone(),
                );
                config.timeout = Duration::from_secs(*timeout_seconds);
                config.enabled = *enabled;

                let client = FluentCrmClient::new(config).map_err(|e| ConfigError::Invalid {
                    message: format!("Failed to build FluentCRM client: {}", e),
                })?;
                Ok(Arc::new(client))
            }
            Self::Memory => Ok(Arc::new(InMemoryContactRepository::new())),
        }
    }
}

// Security: Don't expose secrets in debug output
impl std::fmt::Debug for CrmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FluentCrm {
                base_url,
                username,
                timeout_seconds,
                enabled,
                ..
            } => f
                .debug_struct("FluentCrm")
                .field("base_url", base_url)
                .field("username", username)
                .field("application_password", &"<REDACTED>")
                .field("timeout_seconds", timeout_seconds)
                .field("enabled", enabled)
                .finish(),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level for the service crates
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(invalid(format!("Invalid log level: {}", self.level))),
        }
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

fn parse_http_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| invalid(format!("{} '{}': {}", key, value, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("{} must be an http(s) URL", key)));
    }
    Ok(url)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
