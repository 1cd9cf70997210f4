//! Runtime reload of the integration settings.
//!
//! The pipeline reads its [`SyncSettings`](eventbrite_sync_core::SyncSettings)
//! from a [`SharedSettings`] store on every delivery. A reload re-reads the
//! configuration sources and swaps the `sync` section into that store, so
//! the next delivery runs with the new token, secret, defaults and debug
//! flag. Listener, CRM and logging sections are only read at startup; the
//! optional hook lets the host follow them where it can.

use eventbrite_sync_core::SharedSettings;
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info, instrument};

use crate::config::ServiceConfig;
use crate::errors::ConfigError;

/// Callback run after a successful reload.
pub type ReloadHook = Box<dyn Fn(&ServiceConfig) + Send + Sync>;

/// Re-reads the configuration and replaces the live settings.
pub struct SettingsReloader {
    explicit_path: Option<PathBuf>,
    settings: SharedSettings,
    on_reload: Option<ReloadHook>,
}

impl SettingsReloader {
    /// Reload from the same sources as startup into `settings`.
    pub fn new(explicit_path: Option<PathBuf>, settings: SharedSettings) -> Self {
        Self {
            explicit_path,
            settings,
            on_reload: None,
        }
    }

    /// Run `hook` with the freshly loaded configuration after each reload.
    pub fn with_hook(mut self, hook: impl Fn(&ServiceConfig) + Send + Sync + 'static) -> Self {
        self.on_reload = Some(Box::new(hook));
        self
    }

    /// Load the configuration again and apply its `sync` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the sources cannot be loaded or the new
    /// settings are invalid. The previous settings stay in effect.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<(), ConfigError> {
        let config = ServiceConfig::load(self.explicit_path.as_deref())?;

        self.settings
            .replace(config.sync.clone())
            .await
            .map_err(|e| ConfigError::Invalid {
                message: e.to_string(),
            })?;

        if let Some(hook) = &self.on_reload {
            hook(&config);
        }

        info!(
            debug_mode = config.sync.debug_mode,
            secret_configured = config.sync.has_webhook_secret(),
            "Integration settings reloaded"
        );
        Ok(())
    }

    /// Reload on every SIGHUP until the process exits.
    ///
    /// A failed reload is logged and the service keeps running with the
    /// previous settings.
    #[cfg(unix)]
    pub async fn reload_on_hangup(self) {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                error!(error = %e, "Failed to install SIGHUP handler; settings reload disabled");
                return;
            }
        };

        while hangup.recv().await.is_some() {
            info!("Received SIGHUP, reloading integration settings");
            if let Err(e) = self.reload().await {
                error!(error = %e, "Settings reload failed; keeping previous settings");
            }
        }
    }
}

impl fmt::Debug for SettingsReloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsReloader")
            .field("explicit_path", &self.explicit_path)
            .field("has_hook", &self.on_reload.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "reload_tests.rs"]
mod tests;
