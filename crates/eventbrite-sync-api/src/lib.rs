//! # Eventbrite Sync HTTP Service
//!
//! HTTP server receiving Eventbrite webhooks and running them through the
//! sync pipeline of `eventbrite-sync-core`.
//!
//! This service provides:
//! - the webhook endpoint (`POST /eventbrite-fluentcrm/v1/webhook` by default)
//! - `GET /health` reporting CRM availability
//! - `GET /metrics` in the Prometheus text format

pub mod config;
pub mod errors;
pub mod metrics;
pub mod reload;
pub mod responses;

pub use config::{
    CrmConfig, FetchConfig, LoggingConfig, ServerConfig, ServiceConfig, WebhookConfig,
    CONFIG_FILE_ENV, ENV_PREFIX,
};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use metrics::ServiceMetrics;
pub use reload::{ReloadHook, SettingsReloader};
pub use responses::{ErrorResponse, HealthResponse};

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use eventbrite_sync_core::{
    ContactRepository, CrmSyncClient, EventFetcher, SettingsProvider, WebhookDispatcher,
    WebhookOutcome, SIGNATURE_HEADER,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

/// Header carrying the per-request correlation id.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Pipeline handling webhook deliveries
    pub dispatcher: Arc<WebhookDispatcher>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        dispatcher: Arc<WebhookDispatcher>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            metrics,
        }
    }
}

/// Wire the pipeline for a configuration.
///
/// Settings and CRM are passed in rather than built here, so the caller
/// keeps handles to both (the settings surface writes one, tests inspect the
/// other).
pub fn build_dispatcher(
    config: &ServiceConfig,
    settings: Arc<dyn SettingsProvider>,
    repository: Arc<dyn ContactRepository>,
) -> Result<WebhookDispatcher, ServiceError> {
    let fetcher = EventFetcher::new(config.fetch.fetcher_config()).map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Failed to build Eventbrite API client: {}", e),
        })
    })?;

    Ok(WebhookDispatcher::new(
        settings,
        fetcher,
        CrmSyncClient::new(repository),
    ))
}

// ============================================================================
// Router
// ============================================================================

/// Create the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let endpoint_path = state.config.webhook.endpoint_path.clone();
    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .route(&endpoint_path, post(handle_webhook))
        .route("/health", get(handle_health_check))
        .route("/metrics", get(metrics_endpoint))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(DefaultBodyLimit::max(max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
pub async fn start_server(
    config: ServiceConfig,
    dispatcher: Arc<WebhookDispatcher>,
) -> Result<(), ServiceError> {
    let metrics = ServiceMetrics::new().map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Failed to initialize metrics: {}", e),
        })
    })?;

    let host = config.server.host.clone();
    let port = config.server.port;
    let shutdown_timeout = std::time::Duration::from_secs(config.server.shutdown_timeout_seconds);

    let app = create_router(AppState::new(config, dispatcher, metrics));

    let address = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", address);

    let shutdown_signal = async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
        }
    };

    // In-flight deliveries finish; new connections are refused once the
    // signal arrives.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Webhook Handler
// ============================================================================

/// Handle an Eventbrite webhook delivery
///
/// The delivery is processed synchronously: the response reports whether the
/// contact reached the CRM, and Eventbrite redelivers on a 5xx. Processing
/// is bounded by `server.timeout_seconds`; a delivery that outruns it is
/// dropped and answered with `504 request_timeout`.
#[instrument(skip(state, headers, body), fields(body_len = body.len()))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>, WebhookHandlerError> {
    state.metrics.webhooks_received_total.inc();
    let timer = state.metrics.webhook_duration_seconds.start_timer();

    let deadline = state.config.server.request_timeout();
    let result = tokio::time::timeout(deadline, process_delivery(&state, &headers, &body))
        .await
        .unwrap_or_else(|_| {
            warn!(
                timeout_seconds = deadline.as_secs(),
                "Webhook processing exceeded request deadline"
            );
            Err(WebhookHandlerError::Timeout {
                seconds: deadline.as_secs(),
            })
        });
    timer.observe_duration();

    match result {
        Ok(outcome) => {
            state.metrics.record_outcome(&outcome);
            Ok(Json(outcome))
        }
        Err(e) => {
            state.metrics.record_failure(e.code());
            Err(e)
        }
    }
}

async fn process_delivery(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<WebhookOutcome, WebhookHandlerError> {
    let signature = match headers.get(SIGNATURE_HEADER) {
        Some(value) => Some(value.to_str().map_err(|_| {
            warn!(header = SIGNATURE_HEADER, "Signature header is not valid text");
            WebhookHandlerError::MalformedSignatureHeader
        })?),
        None => None,
    };

    let outcome = state.dispatcher.receive(body, signature).await?;

    info!(
        synced = outcome.is_synced(),
        message = %outcome.message,
        "Webhook handled"
    );

    Ok(outcome)
}

// ============================================================================
// Health and Metrics Handlers
// ============================================================================

/// Health check endpoint
///
/// Returns 503 while the CRM cannot accept writes, since every delivery
/// would fail with `fluentcrm_not_active`.
#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let health = HealthResponse::new(state.dispatcher.is_crm_active());

    let status = if health.is_healthy() {
        StatusCode::OK
    } else {
        warn!("Health check failed: CRM is not active");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(health))
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.render().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Reuses an inbound `x-correlation-id` or generates one, records it on the
/// span and echoes it on the response.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
