//! Health server for Kubernetes probes and Prometheus metrics
//!
//! Provides HTTP endpoints for:
//! - `/healthz` - Liveness probe (is the process alive?)
//! - `/readyz` - Readiness probe (has the first sweep completed?)
//! - `/metrics` - Prometheus metrics

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

/// Labels for per-namespace counters
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct NamespaceLabels {
    pub namespace: String,
}

impl prometheus_client::encoding::EncodeLabelSet for NamespaceLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder<'_>,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for corrections, split by the posture they enforced
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct CorrectionLabels {
    pub namespace: String,
    pub posture: String,
}

impl prometheus_client::encoding::EncodeLabelSet for CorrectionLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder<'_>,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("posture", self.posture.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for namespace posture gauges
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct PostureLabels {
    pub posture: String,
}

impl prometheus_client::encoding::EncodeLabelSet for PostureLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder<'_>,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("posture", self.posture.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics state
pub struct Metrics {
    /// ScaledObjects corrected
    pub corrections_total: Family<CorrectionLabels, Counter>,
    /// Updates rejected with a conflict
    pub conflicts_total: Family<NamespaceLabels, Counter>,
    /// Namespaces whose reconciliation failed
    pub errors_total: Family<NamespaceLabels, Counter>,
    /// Duration of a full sweep over all namespaces
    pub sweep_duration_seconds: Histogram,
    /// Namespaces by desired posture in the last sweep
    pub namespaces_total: Family<PostureLabels, Gauge>,
    /// Unix timestamp of the last completed sweep
    pub last_sweep_timestamp_seconds: Gauge,

    /// Prometheus registry
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

        let corrections_total = Family::<CorrectionLabels, Counter>::default();
        registry.register(
            "keda_suspender_corrections",
            "Total number of ScaledObjects corrected",
            corrections_total.clone(),
        );

        let conflicts_total = Family::<NamespaceLabels, Counter>::default();
        registry.register(
            "keda_suspender_conflicts",
            "Total number of ScaledObject updates rejected with a conflict",
            conflicts_total.clone(),
        );

        let errors_total = Family::<NamespaceLabels, Counter>::default();
        registry.register(
            "keda_suspender_errors",
            "Total number of failed namespace reconciliations",
            errors_total.clone(),
        );

        let sweep_duration_seconds = Histogram::new(exponential_buckets(0.01, 2.0, 12));
        registry.register(
            "keda_suspender_sweep_duration_seconds",
            "Duration of a sweep over all namespaces in seconds",
            sweep_duration_seconds.clone(),
        );

        let namespaces_total = Family::<PostureLabels, Gauge>::default();
        registry.register(
            "keda_suspender_namespaces",
            "Number of namespaces by desired posture",
            namespaces_total.clone(),
        );

        let last_sweep_timestamp_seconds = Gauge::default();
        registry.register(
            "keda_suspender_last_sweep_timestamp_seconds",
            "Unix timestamp of the last completed sweep",
            last_sweep_timestamp_seconds.clone(),
        );

        Self {
            corrections_total,
            conflicts_total,
            errors_total,
            sweep_duration_seconds,
            namespaces_total,
            last_sweep_timestamp_seconds,
            registry,
        }
    }

    /// Record a ScaledObject brought to `posture`
    pub fn record_correction(&self, namespace: &str, posture: &str) {
        let labels = CorrectionLabels {
            namespace: namespace.to_string(),
            posture: posture.to_string(),
        };
        self.corrections_total.get_or_create(&labels).inc();
    }

    /// Record an update rejected with a conflict
    pub fn record_conflict(&self, namespace: &str) {
        let labels = NamespaceLabels {
            namespace: namespace.to_string(),
        };
        self.conflicts_total.get_or_create(&labels).inc();
    }

    /// Record a failed namespace reconciliation
    pub fn record_error(&self, namespace: &str) {
        let labels = NamespaceLabels {
            namespace: namespace.to_string(),
        };
        self.errors_total.get_or_create(&labels).inc();
    }

    /// Record a completed sweep
    pub fn record_sweep(&self, duration_secs: f64) {
        self.sweep_duration_seconds.observe(duration_secs);
    }

    /// Set the number of namespaces asking for `posture`
    pub fn set_namespaces_by_posture(&self, posture: &str, count: i64) {
        let labels = PostureLabels {
            posture: posture.to_string(),
        };
        self.namespaces_total.get_or_create(&labels).set(count);
    }

    /// Encode metrics to Prometheus text format
    ///
    /// Returns an empty string if encoding fails.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = encode(&mut buffer, &self.registry) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the first sweep has completed
    pub ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Arc<Metrics>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Mark the suspender as ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the suspender is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }

    /// Publish when the last sweep completed
    pub fn mark_sweep(&self, unix_secs: u64) {
        self.metrics
            .last_sweep_timestamp_seconds
            .set(i64::try_from(unix_secs).unwrap_or(i64::MAX));
    }
}

/// Liveness probe handler
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 503 Service Unavailable until the first sweep completes.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
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
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Run the health server on `addr`
pub async fn run_health_server(
    state: Arc<HealthState>,
    addr: SocketAddr,
) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Health server listening on {}", addr);

    axum::serve(listener, app).await
}
