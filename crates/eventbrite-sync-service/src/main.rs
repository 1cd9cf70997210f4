//! # Eventbrite Sync Service
//!
//! Binary entry point for the webhook service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes logging
//! - Connects the configured CRM and wires the sync pipeline
//! - Starts the HTTP server from eventbrite-sync-api

use eventbrite_sync_api::{
    build_dispatcher, start_server, ConfigError, LoggingConfig, ServiceConfig, ServiceError,
    CONFIG_FILE_ENV,
};
use eventbrite_sync_core::{webhook_url, ContactRepository, SharedSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};
use url::Url;

/// Crates whose log level follows the configuration.
const SERVICE_CRATES: [&str; 3] = [
    "eventbrite_sync_service",
    "eventbrite_sync_api",
    "eventbrite_sync_core",
];

#[tokio::main]
async fn main() {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (later sources override earlier ones):
    //  1. /etc/eventbrite-sync/service.yaml
    //  2. ./config/service.yaml
    //  3. Path given by EBS_CONFIG_FILE
    //  4. Environment variables prefixed EBS__ (double-underscore separator)
    //     e.g. EBS__SYNC__API_TOKEN=... sets sync.api_token
    //
    // Logging depends on the configuration, so a load failure is reported
    // through a default subscriber.
    // -------------------------------------------------------------------------
    let explicit_path = std::env::var(CONFIG_FILE_ENV)
        .ok()
        .filter(|path| !path.is_empty())
        .map(PathBuf::from);

    let loaded = ServiceConfig::load(explicit_path.as_deref());

    let log_filter = match &loaded {
        Ok(config) => init_logging(&config.logging, config.sync.debug_mode),
        Err(_) => init_logging(&LoggingConfig::default(), false),
    };

    info!("Starting Eventbrite sync service");
    if let Some(path) = &explicit_path {
        info!(path = %path.display(), "Loaded configuration from explicit path");
    }

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(
                error = %e,
                "Could not load service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    };

    if let Err(e) = config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    if let Err(e) = run(config, explicit_path, log_filter).await {
        error!("Service failed: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }
}

/// Wire the pipeline and serve until a shutdown signal arrives.
///
/// On unix, SIGHUP re-reads the configuration: the `sync` section applies
/// to the next delivery and the log filter follows `debug_mode` and
/// `logging.level`. Everything else needs a restart.
async fn run(
    config: ServiceConfig,
    explicit_path: Option<PathBuf>,
    log_filter: LogFilter,
) -> Result<(), ServiceError> {
    let crm = config.crm()?;
    let repository = crm.connect()?;
    info!(crm = crm.kind(), active = repository.is_active(), "CRM connected");

    if !config.sync.has_webhook_secret() {
        warn!("No webhook secret configured; deliveries will not be authenticated");
    }
    if config.sync.api_token.is_empty() {
        warn!("No Eventbrite API token configured; deliveries will fail with no_api_token");
    }

    if let Some(base) = &config.webhook.public_base_url {
        let base = Url::parse(base).map_err(|e| ConfigError::Invalid {
            message: format!("webhook.public_base_url: {}", e),
        })?;
        info!(
            url = %webhook_url(&base, &config.webhook.endpoint_path),
            "Register this URL as the Eventbrite webhook endpoint"
        );
    }

    let settings = SharedSettings::new(config.sync.clone());
    let dispatcher = build_dispatcher(&config, Arc::new(settings.clone()), repository)?;

    #[cfg(unix)]
    {
        let reloader = eventbrite_sync_api::SettingsReloader::new(explicit_path, settings)
            .with_hook(move |config| log_filter.apply(&config.logging, config.sync.debug_mode));
        tokio::spawn(reloader.reload_on_hangup());
        info!("Send SIGHUP to reload integration settings");
    }
    #[cfg(not(unix))]
    {
        let _ = (explicit_path, settings, log_filter);
    }

    info!(
        host = %config.server.host,
        port = config.server.port,
        path = %config.webhook.endpoint_path,
        "Starting HTTP server"
    );

    start_server(config, Arc::new(dispatcher)).await
}

/// Handle on the installed log filter.
///
/// When `RUST_LOG` is set it owns the filter and reloads leave it alone.
#[derive(Clone)]
struct LogFilter {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogFilter {
    /// Swap in the default directives for the given settings.
    fn apply(&self, logging: &LoggingConfig, debug_mode: bool) {
        if self.from_env {
            return;
        }

        let level = effective_level(logging, debug_mode);
        match self.handle.reload(EnvFilter::new(default_filter(level))) {
            Ok(()) => info!(level = level, "Log filter updated"),
            Err(e) => warn!(error = %e, "Failed to update log filter"),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the service crates log at the
/// configured level, or at `debug` when debug mode is on.
fn init_logging(logging: &LoggingConfig, debug_mode: bool) -> LogFilter {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (
            EnvFilter::new(default_filter(effective_level(logging, debug_mode))),
            false,
        ),
    };
    let (filter, handle) = reload::Layer::new(filter);

    let (json_layer, text_layer) = if logging.json_format {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    LogFilter { handle, from_env }
}

/// Level for the service crates: `debug` in debug mode, else the configured one.
fn effective_level(logging: &LoggingConfig, debug_mode: bool) -> &str {
    if debug_mode {
        "debug"
    } else {
        logging.level.as_str()
    }
}

/// Filter directives for the service crates at `level`.
fn default_filter(level: &str) -> String {
    let mut directives: Vec<String> = SERVICE_CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level))
        .collect();
    directives.push("tower_http=info".to_string());
    directives.join(",")
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
