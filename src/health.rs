//! Probe and Prometheus endpoints.
//!
//! - `/healthz` - liveness, 200 while the process serves requests
//! - `/readyz` - 200 once the cluster registry is built, 503 otherwise
//! - `/metrics` - per-operation counters and latency

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;

/// Labels for operation metrics (alias + operation)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct OperationLabels {
    pub alias: String,
    pub operation: String,
}

impl OperationLabels {
    fn new(alias: &str, operation: &str) -> Self {
        Self {
            alias: alias.to_string(),
            operation: operation.to_string(),
        }
    }
}

impl EncodeLabelSet for OperationLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("alias", self.alias.as_str()).encode(encoder.encode_label())?;
        ("operation", self.operation.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

pub struct Metrics {
    pub operations_total: Family<OperationLabels, Counter>,
    pub operation_errors_total: Family<OperationLabels, Counter>,
    pub operation_duration_seconds: Family<OperationLabels, Histogram>,
    /// Endpoints in the cluster registry
    pub registered_clusters: Gauge,
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let operations_total = Family::<OperationLabels, Counter>::default();
        registry.register(
            "flink_manager_operations",
            "Total number of cluster operations",
            operations_total.clone(),
        );

        let operation_errors_total = Family::<OperationLabels, Counter>::default();
        registry.register(
            "flink_manager_operation_errors",
            "Total number of failed cluster operations",
            operation_errors_total.clone(),
        );

        let operation_duration_seconds =
            Family::<OperationLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.005, 2.0, 12))
            });
        registry.register(
            "flink_manager_operation_duration_seconds",
            "Duration of cluster operations in seconds",
            operation_duration_seconds.clone(),
        );

        let registered_clusters = Gauge::default();
        registry.register(
            "flink_manager_registered_clusters",
            "Number of Kubernetes endpoints in the registry",
            registered_clusters.clone(),
        );

        Self {
            operations_total,
            operation_errors_total,
            operation_duration_seconds,
            registered_clusters,
            registry,
        }
    }

    /// Count one finished operation and its latency
    pub fn record_operation(&self, alias: &str, operation: &str, duration_secs: f64) {
        let labels = OperationLabels::new(alias, operation);
        self.operations_total.get_or_create(&labels).inc();
        self.operation_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    pub fn record_error(&self, alias: &str, operation: &str) {
        self.operation_errors_total
            .get_or_create(&OperationLabels::new(alias, operation))
            .inc();
    }

    pub fn set_registered_clusters(&self, count: usize) {
        self.registered_clusters
            .set(i64::try_from(count).unwrap_or(i64::MAX));
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

/// Shared state behind the probe routes
pub struct HealthState {
    ready: RwLock<bool>,
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Starts as not ready
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Router for the probe and metrics routes
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
