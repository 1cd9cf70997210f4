//! # Eventbrite Sync CLI
//!
//! Operator tooling for the Eventbrite sync service.
//!
//! This module provides CLI commands for:
//! - Printing the webhook URL to register with Eventbrite
//! - Validating the service configuration
//! - Signing payloads the way Eventbrite does
//! - Sending a signed test delivery to a running service

use clap::{Parser, Subcommand};
use eventbrite_sync_api::{ConfigError, ServiceConfig};
use eventbrite_sync_core::{sign_payload, webhook_url, DEFAULT_WEBHOOK_PATH, SIGNATURE_HEADER};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

// ============================================================================
// CLI Structure
// ============================================================================

/// Eventbrite Sync CLI - tooling for the Eventbrite to FluentCRM webhook service
#[derive(Debug, Parser)]
#[command(name = "eventbrite-sync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tooling for the Eventbrite to FluentCRM webhook service")]
pub struct Cli {
    /// Logging level
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the URL to register as the Eventbrite webhook endpoint
    WebhookUrl {
        /// Public base URL of the deployment
        #[arg(short, long)]
        base_url: String,

        /// Webhook route on the service
        #[arg(short, long, default_value = DEFAULT_WEBHOOK_PATH)]
        path: String,
    },

    /// Print the x-eventbrite-signature value for a payload
    Sign {
        /// Webhook secret
        #[arg(short, long, env = "EBS_WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,

        /// Payload text
        #[arg(short, long, conflicts_with = "file")]
        data: Option<String>,

        /// File holding the payload
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Send a test delivery to a running service
    Send {
        /// Full URL of the service's webhook endpoint
        #[arg(short, long)]
        url: String,

        /// Eventbrite resource the delivery points at
        #[arg(short, long)]
        api_url: String,

        /// Webhook action
        #[arg(long, default_value = "order.placed")]
        action: String,

        /// Webhook secret used to sign the delivery
        #[arg(short, long, env = "EBS_WEBHOOK_SECRET", hide_env_values = true)]
        secret: Option<String>,

        /// Request timeout in seconds
        #[arg(short, long, default_value = "30")]
        timeout: u64,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Load and validate the service configuration
    Check {
        /// Extra configuration file, layered like EBS_CONFIG_FILE
        #[arg(short, long, env = "EBS_CONFIG_FILE")]
        file: Option<PathBuf>,
    },
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli);

    let output = execute(cli.command).await?;
    println!("{}", output);
    Ok(())
}

/// Run a command and return what it prints.
pub async fn execute(command: Commands) -> Result<String, CliError> {
    match command {
        Commands::WebhookUrl { base_url, path } => execute_webhook_url_command(&base_url, &path),
        Commands::Sign { secret, data, file } => execute_sign_command(&secret, data, file),
        Commands::Send {
            url,
            api_url,
            action,
            secret,
            timeout,
        } => {
            execute_send_command(
                &url,
                &api_url,
                &action,
                secret.as_deref(),
                Duration::from_secs(timeout),
            )
            .await
        }
        Commands::Config { action } => match action {
            ConfigCommands::Check { file } => execute_config_check_command(file),
        },
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Initialize logging on stderr, leaving stdout for command output.
fn initialize_logging(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn execute_webhook_url_command(base_url: &str, path: &str) -> Result<String, CliError> {
    let base = parse_url("base-url", base_url)?;
    if !path.starts_with('/') {
        return Err(CliError::InvalidArgument {
            arg: "path".to_string(),
            message: "must start with '/'".to_string(),
        });
    }

    Ok(webhook_url(&base, path))
}

fn execute_sign_command(
    secret: &str,
    data: Option<String>,
    file: Option<PathBuf>,
) -> Result<String, CliError> {
    if secret.is_empty() {
        return Err(CliError::InvalidArgument {
            arg: "secret".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    let payload = match (data, file) {
        (Some(data), _) => data.into_bytes(),
        (None, Some(path)) => std::fs::read(&path)?,
        (None, None) => {
            return Err(CliError::InvalidArgument {
                arg: "data".to_string(),
                message: "either --data or --file is required".to_string(),
            })
        }
    };

    Ok(sign_payload(secret, &payload))
}

async fn execute_send_command(
    url: &str,
    api_url: &str,
    action: &str,
    secret: Option<&str>,
    timeout: Duration,
) -> Result<String, CliError> {
    let endpoint = parse_url("url", url)?;
    parse_url("api-url", api_url)?;

    let body = serde_json::to_vec(&serde_json::json!({
        "api_url": api_url,
        "config": {"action": action},
    }))
    .map_err(|e| CliError::CommandFailed {
        message: format!("Failed to encode delivery: {}", e),
    })?;

    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let mut request = client
        .post(endpoint)
        .header("Content-Type", "application/json")
        .body(body.clone());

    match secret.filter(|s| !s.is_empty()) {
        Some(secret) => {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body));
        }
        None => debug!("Sending unsigned delivery"),
    }

    info!(url = %url, action = %action, "Sending test delivery");
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if status.is_success() {
        Ok(format!("{} {}", status.as_u16(), text))
    } else {
        Err(CliError::CommandFailed {
            message: format!("service answered {}: {}", status.as_u16(), text),
        })
    }
}

fn execute_config_check_command(file: Option<PathBuf>) -> Result<String, CliError> {
    let config = ServiceConfig::load(file.as_deref())?;
    config.validate()?;

    let mut lines = vec![
        "Configuration is valid".to_string(),
        format!("  listen:        {}:{}", config.server.host, config.server.port),
        format!("  endpoint:      {}", config.webhook.endpoint_path),
        format!("  crm:           {}", config.crm()?.kind()),
        format!(
            "  api token:     {}",
            if config.sync.api_token.is_empty() { "missing" } else { "set" }
        ),
        format!(
            "  webhook secret: {}",
            if config.sync.has_webhook_secret() {
                "set"
            } else {
                "missing (deliveries are not authenticated)"
            }
        ),
    ];

    if let Some(base) = &config.webhook.public_base_url {
        let base = parse_url("webhook.public_base_url", base)?;
        lines.push(format!(
            "  webhook url:   {}",
            webhook_url(&base, &config.webhook.endpoint_path)
        ));
    }

    Ok(lines.join("\n"))
}

fn parse_url(arg: &str, value: &str) -> Result<Url, CliError> {
    let url = Url::parse(value).map_err(|e| CliError::InvalidArgument {
        arg: arg.to_string(),
        message: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CliError::InvalidArgument {
            arg: arg.to_string(),
            message: "must be an http(s) URL".to_string(),
        });
    }
    Ok(url)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
