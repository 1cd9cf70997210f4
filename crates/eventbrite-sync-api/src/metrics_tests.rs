use super::*;
use eventbrite_sync_core::SyncResult;

#[test]
fn test_instances_do_not_collide() {
    let first = ServiceMetrics::new();
    let second = ServiceMetrics::new();

    assert!(first.is_ok());
    assert!(second.is_ok());
}

#[test]
fn test_outcomes_are_split_into_synced_and_ignored() {
    let metrics = ServiceMetrics::new().unwrap();

    metrics.record_outcome(&WebhookOutcome::synced(SyncResult {
        contact_id: 1,
        email: "a@b.com".to_string(),
        status: "subscribed".to_string(),
    }));
    metrics.record_outcome(&WebhookOutcome::ignored());
    metrics.record_outcome(&WebhookOutcome::ignored());

    assert_eq!(metrics.contacts_synced_total.get(), 1);
    assert_eq!(metrics.webhooks_ignored_total.get(), 2);
}

#[test]
fn test_signature_failures_are_also_counted_separately() {
    let metrics = ServiceMetrics::new().unwrap();

    metrics.record_failure("invalid_signature");
    metrics.record_failure("no_email");

    assert_eq!(metrics.signature_rejections_total.get(), 1);
    assert_eq!(
        metrics
            .webhook_failures_total
            .with_label_values(&["no_email"])
            .get(),
        1
    );
}

#[test]
fn test_render_includes_counters() {
    let metrics = ServiceMetrics::new().unwrap();
    metrics.webhooks_received_total.inc();
    metrics.record_failure("fluentcrm_error");

    let text = metrics.render().unwrap();

    assert!(text.contains("webhooks_received_total 1"));
    assert!(text.contains("webhook_failures_total{code=\"fluentcrm_error\"} 1"));
}
