use super::*;

#[test]
fn test_webhook_url_joins_with_single_slash() {
    let base = Url::parse("https://example.org").unwrap();

    assert_eq!(
        webhook_url(&base, "/eventbrite-fluentcrm/v1/webhook"),
        "https://example.org/eventbrite-fluentcrm/v1/webhook"
    );
    assert_eq!(
        webhook_url(&base, "hooks/eventbrite"),
        "https://example.org/hooks/eventbrite"
    );
}

#[test]
fn test_webhook_url_keeps_base_prefix() {
    let base = Url::parse("https://example.org/wp-json/").unwrap();

    assert_eq!(
        webhook_url(&base, DEFAULT_WEBHOOK_PATH),
        "https://example.org/wp-json/eventbrite-fluentcrm/v1/webhook"
    );
}
