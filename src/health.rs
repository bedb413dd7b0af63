//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 once the webhook listener is up)
//! - `/metrics` - Prometheus metrics endpoint

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

/// Labels for review outcome metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReviewLabels {
    pub endpoint: String,
    pub decision: String,
}

/// Labels for per-endpoint metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EndpointLabels {
    pub endpoint: String,
}

/// Labels for requests rejected before evaluation
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RejectLabels {
    pub reason: String,
}

/// Shared metrics for the webhook
pub struct Metrics {
    /// Reviews answered, by endpoint and decision
    pub reviews_total: Family<ReviewLabels, Counter>,
    /// Review handling duration histogram
    pub review_duration_seconds: Family<EndpointLabels, Histogram>,
    /// Requests rejected at the transport layer
    pub rejected_requests_total: Family<RejectLabels, Counter>,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let reviews_total = Family::<ReviewLabels, Counter>::default();
        registry.register(
            "admission_gate_reviews",
            "Total number of admission reviews answered",
            reviews_total.clone(),
        );

        let review_duration_seconds =
            Family::<EndpointLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.0001, 2.0, 15))
            });
        registry.register(
            "admission_gate_review_duration_seconds",
            "Duration of admission review handling in seconds",
            review_duration_seconds.clone(),
        );

        let rejected_requests_total = Family::<RejectLabels, Counter>::default();
        registry.register(
            "admission_gate_rejected_requests",
            "Total number of requests rejected before policy evaluation",
            rejected_requests_total.clone(),
        );

        Self {
            reviews_total,
            review_duration_seconds,
            rejected_requests_total,
            registry,
        }
    }

    /// Record an answered review
    pub fn record_review(&self, endpoint: &str, allowed: bool, duration_secs: f64) {
        let labels = ReviewLabels {
            endpoint: endpoint.to_string(),
            decision: if allowed { "allowed" } else { "denied" }.to_string(),
        };
        self.reviews_total.get_or_create(&labels).inc();
        self.review_duration_seconds
            .get_or_create(&EndpointLabels {
                endpoint: endpoint.to_string(),
            })
            .observe(duration_secs);
    }

    /// Record a request rejected before evaluation
    pub fn record_rejected(&self, reason: &str) {
        self.rejected_requests_total
            .get_or_create(&RejectLabels {
                reason: reason.to_string(),
            })
            .inc();
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the webhook listener is accepting reviews
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the webhook as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the webhook is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
///
/// Returns 200 OK if the process is alive.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 503 Service Unavailable until TLS is loaded and after shutdown begins.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server on `addr` until the process exits
pub async fn run_health_server(
    state: Arc<HealthState>,
    addr: SocketAddr,
) -> Result<(), std::io::Error> {
    let app = create_router(state);

    info!(port = addr.port(), "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
