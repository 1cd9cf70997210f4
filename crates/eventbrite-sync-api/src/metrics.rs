//! Metrics collection for the webhook service.
//!
//! Each [`ServiceMetrics`] owns its registry, so several instances can live in
//! one process (one per router in tests) without duplicate registrations.

use eventbrite_sync_core::{SyncError, WebhookOutcome};
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Service metrics for observability
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    pub webhooks_received_total: IntCounter,
    pub contacts_synced_total: IntCounter,
    pub webhooks_ignored_total: IntCounter,
    pub webhook_failures_total: IntCounterVec,
    pub signature_rejections_total: IntCounter,
    pub webhook_duration_seconds: Histogram,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let webhooks_received_total = IntCounter::with_opts(Opts::new(
            "webhooks_received_total",
            "Total webhook deliveries received",
        ))?;
        let contacts_synced_total = IntCounter::with_opts(Opts::new(
            "contacts_synced_total",
            "Contacts written to the CRM",
        ))?;
        let webhooks_ignored_total = IntCounter::with_opts(Opts::new(
            "webhooks_ignored_total",
            "Deliveries acknowledged without processing",
        ))?;
        let webhook_failures_total = IntCounterVec::new(
            Opts::new("webhook_failures_total", "Failed deliveries by error code"),
            &["code"],
        )?;
        let signature_rejections_total = IntCounter::with_opts(Opts::new(
            "signature_rejections_total",
            "Deliveries rejected for an invalid signature",
        ))?;
        let webhook_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "webhook_duration_seconds",
                "Webhook processing time distribution",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 15.0, 30.0]),
        )?;

        registry.register(Box::new(webhooks_received_total.clone()))?;
        registry.register(Box::new(contacts_synced_total.clone()))?;
        registry.register(Box::new(webhooks_ignored_total.clone()))?;
        registry.register(Box::new(webhook_failures_total.clone()))?;
        registry.register(Box::new(signature_rejections_total.clone()))?;
        registry.register(Box::new(webhook_duration_seconds.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Arc::new(Self {
            registry,
            webhooks_received_total,
            contacts_synced_total,
            webhooks_ignored_total,
            webhook_failures_total,
            signature_rejections_total,
            webhook_duration_seconds,
        }))
    }

    /// Count a successfully handled delivery.
    pub fn record_outcome(&self, outcome: &WebhookOutcome) {
        if outcome.is_synced() {
            self.contacts_synced_total.inc();
        } else {
            self.webhooks_ignored_total.inc();
        }
    }

    /// Count a failed delivery under its error code.
    pub fn record_failure(&self, code: &str) {
        self.webhook_failures_total.with_label_values(&[code]).inc();
        if code == SyncError::InvalidSignature.code() {
            self.signature_rejections_total.inc();
        }
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
