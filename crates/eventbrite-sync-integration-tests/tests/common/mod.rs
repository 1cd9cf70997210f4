//! Common test utilities for eventbrite-sync integration tests
//!
//! This module provides:
//! - A contact repository that records every write
//! - A stand-in for the Eventbrite API
//! - Builders for routers, deliveries and signed requests

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use eventbrite_sync_api::{
    build_dispatcher, create_router, AppState, CrmConfig, ServiceConfig, ServiceMetrics,
};
use eventbrite_sync_core::crm::InMemoryContactRepository;
use eventbrite_sync_core::{
    sign_payload, ContactRecord, ContactRepository, CrmContact, CrmError, SharedSettings,
    SyncSettings, DEFAULT_WEBHOOK_PATH, SIGNATURE_HEADER,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_TOKEN: &str = "eb-private-token";
pub const WEBHOOK_SECRET: &str = "whsec-integration";

// ============================================================================
// Recording repository
// ============================================================================

/// Repository delegating to the in-memory store while recording each write.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct RecordingRepository {
    inner: InMemoryContactRepository,
    writes: Arc<Mutex<Vec<ContactRecord>>>,
}

#[allow(dead_code)]
impl RecordingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<ContactRecord> {
        self.writes.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn store(&self) -> &InMemoryContactRepository {
        &self.inner
    }
}

#[async_trait]
impl ContactRepository for RecordingRepository {
    fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    async fn create_or_update(&self, record: &ContactRecord) -> Result<CrmContact, CrmError> {
        self.writes.lock().unwrap().push(record.clone());
        self.inner.create_or_update(record).await
    }
}

// ============================================================================
// Eventbrite API stand-in
// ============================================================================

/// Start a mock Eventbrite API serving `resource` at `resource_path`.
///
/// Requests must carry the bearer token from [`API_TOKEN`].
#[allow(dead_code)]
pub async fn eventbrite_api(resource_path: &str, resource: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(resource_path))
        .and(header("authorization", format!("Bearer {}", API_TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(resource))
        .mount(&server)
        .await;
    server
}

/// An attendee resource as the Eventbrite API returns it.
#[allow(dead_code)]
pub fn attendee_resource(email: &str, first_name: &str, last_name: &str) -> Value {
    json!({
        "id": "3001",
        "profile": {
            "email": email,
            "first_name": first_name,
            "last_name": last_name,
            "cell_phone": "+15551234567"
        }
    })
}

// ============================================================================
// Application builders
// ============================================================================

/// Settings with a token, a secret and default tags.
#[allow(dead_code)]
pub fn settings() -> SyncSettings {
    SyncSettings {
        api_token: API_TOKEN.to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        default_tags: vec!["eventbrite".to_string()],
        default_lists: vec!["7".to_string()],
        ..Default::default()
    }
}

/// Router wired to the given repository.
#[allow(dead_code)]
pub fn create_test_app(
    settings: SyncSettings,
    repository: Arc<dyn ContactRepository>,
) -> (Router, Arc<ServiceMetrics>) {
    let config = ServiceConfig {
        crm: Some(CrmConfig::Memory),
        ..Default::default()
    };
    let dispatcher = build_dispatcher(&config, Arc::new(SharedSettings::new(settings)), repository)
        .expect("dispatcher should build");
    let metrics = ServiceMetrics::new().expect("metrics should build");

    (
        create_router(AppState::new(config, Arc::new(dispatcher), metrics.clone())),
        metrics,
    )
}

// ============================================================================
// Requests
// ============================================================================

/// Serialized webhook envelope.
#[allow(dead_code)]
pub fn delivery(api_url: &str, action: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "api_url": api_url,
        "config": {"action": action, "endpoint_url": "https://example.org/hook"}
    }))
    .unwrap()
}

/// POST to the webhook route with an optional signature header.
#[allow(dead_code)]
pub fn webhook_request(body: &[u8], signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(DEFAULT_WEBHOOK_PATH)
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_vec())).unwrap()
}

/// POST signed with [`WEBHOOK_SECRET`].
#[allow(dead_code)]
pub fn signed_request(body: &[u8]) -> Request<Body> {
    webhook_request(body, Some(&sign_payload(WEBHOOK_SECRET, body)))
}

#[allow(dead_code)]
pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
