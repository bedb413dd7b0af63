//! Admission webhook server.
//!
//! Provides HTTPS endpoints for the Kubernetes API server:
//! - `POST /mutate` - admits objects unchanged
//! - `POST /validate` - applies the label policy
//!
//! Any other path is answered with an explicit "unknown endpoint" denial.
//!
//! Request pipeline: read body → check body/content type → decode review →
//! route → encode response. Transport failures answer 400 with a plain-text
//! body, a body that is not a valid AdmissionReview answers 200 with the error
//! in `response.status.message`, and an encode failure answers 500.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::post};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use kube::core::admission::AdmissionResponse;
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, error, info, warn};

use crate::config::{Config, DEFAULT_MAX_BODY_BYTES};
use crate::error::{Error, Result, ReviewError};
use crate::health::HealthState;
use crate::webhooks::codec::{JSON_CONTENT_TYPE, JsonCodec, ReviewCodec, decode_review};
use crate::webhooks::router::{
    Endpoint, MUTATE_PATH, ReviewRouter, VALIDATE_PATH, object_decode_failure,
};

/// Shared state for webhook handlers
pub struct WebhookState {
    /// Policy dispatch
    pub router: ReviewRouter,
    /// Wire codec for AdmissionReview envelopes
    pub codec: Arc<dyn ReviewCodec>,
    /// Metrics and readiness, absent in tests
    pub health: Option<Arc<HealthState>>,
}

impl WebhookState {
    /// State using the JSON codec
    pub fn new(router: ReviewRouter) -> Self {
        Self {
            router,
            codec: Arc::new(JsonCodec),
            health: None,
        }
    }

    /// Replace the wire codec
    pub fn with_codec(mut self, codec: Arc<dyn ReviewCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Record metrics into `health`
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    fn record_review(&self, endpoint: &Endpoint, allowed: bool, started: Instant) {
        if let Some(health) = &self.health {
            health.metrics.record_review(
                endpoint.as_str(),
                allowed,
                started.elapsed().as_secs_f64(),
            );
        }
    }

    fn record_rejected(&self, err: &ReviewError) {
        if let Some(health) = &self.health {
            health.metrics.record_rejected(err.reason());
        }
    }
}

/// Per-request resource bounds
#[derive(Clone, Copy, Debug)]
pub struct RequestLimits {
    /// Requests still running after this are answered with 408
    pub timeout: Duration,
    /// Bodies above this size fail to read
    pub max_body_bytes: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Listener settings
#[derive(Clone, Debug)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub limits: RequestLimits,
    /// Time in-flight requests get after shutdown is requested
    pub shutdown_grace: Duration,
}

impl From<&Config> for ServerSettings {
    fn from(config: &Config) -> Self {
        Self {
            addr: config.webhook_addr(),
            cert_path: config.cert.clone(),
            key_path: config.key.clone(),
            limits: RequestLimits {
                timeout: config.request_timeout(),
                max_body_bytes: config.max_body_bytes,
            },
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>, limits: RequestLimits) -> Router {
    Router::new()
        .route(MUTATE_PATH, post(mutate_handler))
        .route(VALIDATE_PATH, post(validate_handler))
        .fallback(unknown_handler)
        .layer(DefaultBodyLimit::max(limits.max_body_bytes))
        .layer(TimeoutLayer::new(limits.timeout))
        .with_state(state)
}

async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    handle_request(&state, Endpoint::Mutate, &headers, body)
}

async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    handle_request(&state, Endpoint::Validate, &headers, body)
}

async fn unknown_handler(
    State(state): State<Arc<WebhookState>>,
    uri: Uri,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    handle_request(&state, Endpoint::from_path(uri.path()), &headers, body)
}

fn handle_request(
    state: &WebhookState,
    endpoint: Endpoint,
    headers: &HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            let err = ReviewError::BadRequest(format!(
                "failed to read body: {}",
                rejection.body_text()
            ));
            warn!(endpoint = %endpoint, error = %err, "Rejecting admission request");
            state.record_rejected(&err);
            return err.into_response();
        }
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    serve_review(state, &endpoint, content_type, &body)
}

/// Answer one admission request from its content type and the body bytes read
pub fn serve_review(
    state: &WebhookState,
    endpoint: &Endpoint,
    content_type: Option<&str>,
    body: &[u8],
) -> Response {
    let started = Instant::now();

    let response = match decode_review(state.codec.as_ref(), content_type, body) {
        Ok(review) => state.router.route(endpoint, review),
        Err(ReviewError::Deserialization(message)) => {
            error!(endpoint = %endpoint, error = %message, "Failed to decode AdmissionReview");
            AdmissionResponse::invalid(message)
        }
        Err(ReviewError::Object {
            uid,
            api_version,
            message,
        }) => {
            warn!(uid = %uid, endpoint = %endpoint, error = %message, "Could not decode admission object");
            object_decode_failure(&uid, &api_version, &message)
        }
        Err(err) => {
            warn!(endpoint = %endpoint, error = %err, "Rejecting admission request");
            state.record_rejected(&err);
            return err.into_response();
        }
    };

    let allowed = response.allowed;
    match state.codec.encode(&response.into_review()) {
        Ok(bytes) => {
            state.record_review(endpoint, allowed, started);
            debug!(endpoint = %endpoint, allowed, bytes = bytes.len(), "Writing admission response");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
                bytes,
            )
                .into_response()
        }
        Err(err) => {
            error!(endpoint = %endpoint, error = %err, "Failed to encode admission response");
            state.record_rejected(&err);
            err.into_response()
        }
    }
}

/// Run the webhook server with TLS until `shutdown` resolves.
///
/// After `shutdown` resolves the listener stops accepting connections and
/// in-flight requests get `settings.shutdown_grace` to finish.
pub async fn run_webhook_server<F>(
    state: Arc<WebhookState>,
    settings: ServerSettings,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let tls = RustlsConfig::from_pem_file(&settings.cert_path, &settings.key_path)
        .await
        .map_err(|e| Error::TlsConfig(e.to_string()))?;

    let health = state.health.clone();
    let app = create_webhook_router(state, settings.limits);
    let handle = Handle::new();

    {
        let handle = handle.clone();
        let health = health.clone();
        let grace = settings.shutdown_grace;
        tokio::spawn(async move {
            shutdown.await;
            if let Some(health) = health {
                health.set_ready(false).await;
            }
            info!(
                grace_secs = grace.as_secs(),
                "Shutdown requested, draining in-flight admission requests"
            );
            handle.graceful_shutdown(Some(grace));
        });
    }

    if let Some(health) = &health {
        health.set_ready(true).await;
    }
    info!(port = settings.addr.port(), "Webhook server listening with TLS");

    axum_server::bind_rustls(settings.addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    info!("Webhook server stopped");
    Ok(())
}
