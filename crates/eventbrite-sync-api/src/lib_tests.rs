//! Router tests for the webhook, health and metrics endpoints.

use super::*;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use eventbrite_sync_core::crm::InMemoryContactRepository;
use eventbrite_sync_core::{sign_payload, SharedSettings, SyncSettings};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Test helpers
// ============================================================================

struct TestApp {
    router: Router,
    repo: Arc<InMemoryContactRepository>,
    metrics: Arc<ServiceMetrics>,
}

fn test_settings() -> SyncSettings {
    SyncSettings {
        api_token: "eb-token".to_string(),
        webhook_secret: "whsec".to_string(),
        default_tags: vec!["eventbrite".to_string()],
        ..Default::default()
    }
}

fn test_app(settings: SyncSettings) -> TestApp {
    test_app_with_config(
        settings,
        ServiceConfig {
            crm: Some(CrmConfig::Memory),
            ..Default::default()
        },
    )
}

fn test_app_with_config(settings: SyncSettings, config: ServiceConfig) -> TestApp {
    let repo = Arc::new(InMemoryContactRepository::new());
    let dispatcher = build_dispatcher(
        &config,
        Arc::new(SharedSettings::new(settings)),
        repo.clone(),
    )
    .expect("dispatcher should build");
    let metrics = ServiceMetrics::new().expect("metrics should build");

    TestApp {
        router: create_router(AppState::new(config, Arc::new(dispatcher), metrics.clone())),
        repo,
        metrics,
    }
}

async fn eventbrite_api() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "profile": {"email": "a@b.com", "first_name": "A"}
        })))
        .mount(&server)
        .await;
    server
}

fn webhook_request(body: &[u8], signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(eventbrite_sync_core::DEFAULT_WEBHOOK_PATH)
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_vec())).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Webhook endpoint
// ============================================================================

#[tokio::test]
async fn test_signed_delivery_syncs_contact() {
    let server = eventbrite_api().await;
    let app = test_app(test_settings());
    let body = serde_json::to_vec(&json!({
        "api_url": format!("{}/orders/1", server.uri()),
        "config": {"action": "order.placed"}
    }))
    .unwrap();
    let signature = sign_payload("whsec", &body);

    let response = app
        .router
        .oneshot(webhook_request(&body, Some(&signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Contact synced to FluentCRM");
    assert_eq!(body["data"]["email"], "a@b.com");
    assert_eq!(body["data"]["status"], "subscribed");
    assert!(body["data"]["contact_id"].is_u64());

    assert_eq!(app.repo.len().await, 1);
    assert_eq!(app.metrics.contacts_synced_total.get(), 1);
}

#[tokio::test]
async fn test_wrong_signature_is_forbidden() {
    let app = test_app(test_settings());
    let body = br#"{"api_url":"https://api.example/orders/1"}"#;
    let signature = sign_payload("not-the-secret", body);

    let response = app
        .router
        .oneshot(webhook_request(body, Some(&signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["code"], "invalid_signature");
    assert_eq!(body["data"]["status"], 403);
    assert_eq!(app.metrics.signature_rejections_total.get(), 1);
}

#[tokio::test]
async fn test_non_text_signature_header_is_forbidden() {
    let app = test_app(test_settings());
    let request = Request::builder()
        .method("POST")
        .uri(eventbrite_sync_core::DEFAULT_WEBHOOK_PATH)
        .header(
            SIGNATURE_HEADER,
            axum::http::HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap(),
        )
        .body(Body::from("{}"))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_api_url_is_bad_request() {
    let app = test_app(SyncSettings {
        webhook_secret: String::new(),
        ..test_settings()
    });

    let response = app
        .router
        .oneshot(webhook_request(br#"{"config":{"action":"order.placed"}}"#, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "invalid_data");
    assert_eq!(body["message"], "Missing api_url in webhook payload");
}

#[tokio::test]
async fn test_unknown_action_is_ok_without_data() {
    let server = eventbrite_api().await;
    let app = test_app(test_settings());
    let body = serde_json::to_vec(&json!({
        "api_url": format!("{}/orders/1", server.uri()),
        "config": {"action": "ticket.refunded"}
    }))
    .unwrap();
    let signature = sign_payload("whsec", &body);

    let response = app
        .router
        .oneshot(webhook_request(&body, Some(&signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"success": true, "message": "Webhook received but not processed"})
    );
    assert!(app.repo.is_empty().await);
    assert_eq!(app.metrics.webhooks_ignored_total.get(), 1);
}

#[tokio::test]
async fn test_slow_upstream_hits_request_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"profile": {"email": "a@b.com"}}))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = ServiceConfig {
        crm: Some(CrmConfig::Memory),
        ..Default::default()
    };
    config.server.timeout_seconds = 1;
    let app = test_app_with_config(test_settings(), config);
    let body = serde_json::to_vec(&json!({
        "api_url": format!("{}/orders/1", server.uri()),
        "config": {"action": "order.placed"}
    }))
    .unwrap();
    let signature = sign_payload("whsec", &body);

    let response = app
        .router
        .oneshot(webhook_request(&body, Some(&signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(
        json_body(response).await,
        json!({
            "code": "request_timeout",
            "message": "Webhook processing exceeded the 1s request deadline",
            "data": {"status": 504}
        })
    );
    assert!(app.repo.is_empty().await);
    assert_eq!(
        app.metrics
            .webhook_failures_total
            .with_label_values(&["request_timeout"])
            .get(),
        1
    );
}

#[tokio::test]
async fn test_get_on_webhook_is_method_not_allowed() {
    let app = test_app(test_settings());
    let request = Request::builder()
        .method("GET")
        .uri(eventbrite_sync_core::DEFAULT_WEBHOOK_PATH)
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let app = test_app(test_settings());
    let request = Request::builder()
        .uri("/health")
        .header(CORRELATION_ID_HEADER, "delivery-42")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get(CORRELATION_ID_HEADER).unwrap(),
        "delivery-42"
    );
}

// ============================================================================
// Health and metrics
// ============================================================================

#[tokio::test]
async fn test_health_reports_active_crm() {
    let app = test_app(test_settings());

    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["crm_active"], true);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_health_is_unavailable_when_crm_inactive() {
    let app = test_app(test_settings());
    app.repo.set_active(false);

    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["crm_active"], false);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_counters() {
    let app = test_app(test_settings());
    app.metrics.webhooks_received_total.inc();

    let response = app
        .router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(text.to_vec()).unwrap();
    assert!(text.contains("webhooks_received_total 1"));
}
