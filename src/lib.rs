pub mod config;
pub mod controller;
pub mod crd;
pub mod health;
pub mod suspension;

pub use config::Config;
pub use controller::{
    CancelHandle, Cancellation, ConformityInspector, Context, Error, KubeStore, ObjectId,
    OptimisticPatcher, PatchOutcome, Result, RetryPolicy, ScaledObjectStore, cancellation,
};
pub use crd::{ScaleTargetRef, ScaledObject, ScaledObjectSpec};
pub use health::{HealthState, Metrics};
pub use suspension::{Correction, DesiredState, Encoding, SuspensionState};

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use kube::Client;
use tokio::time::MissedTickBehavior;

use controller::{list_target_namespaces, sweep};

/// Run the suspender until `cancel` fires.
///
/// Every `config.interval` the annotated namespaces are listed and each one
/// is swept. If `health_state` is provided, metrics are recorded and the
/// readiness probe flips after the first sweep.
pub async fn run_suspender(
    client: Client,
    config: Config,
    health_state: Option<Arc<HealthState>>,
    cancel: Cancellation,
) {
    let scope_msg = config.namespace.as_deref().unwrap_or("cluster-wide");
    tracing::info!(
        encoding = %config.encoding,
        prefix = %config.prefix,
        "Starting ScaledObject suspender (scope: {})",
        scope_msg
    );

    let store: Arc<dyn ScaledObjectStore> = Arc::new(KubeStore::new(client.clone()));
    let ctx = match &health_state {
        Some(state) => Context::with_metrics(store, &config, state.metrics.clone()),
        None => Context::new(store, &config),
    };

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let targets = match list_target_namespaces(
            client.clone(),
            &config.prefix,
            config.namespace.as_deref(),
        )
        .await
        {
            Ok(targets) => targets,
            Err(e) => {
                tracing::error!("Failed to list namespaces: {}", e);
                continue;
            }
        };

        let report = sweep(&ctx, targets, &cancel).await;
        for (namespace, e) in &report.failed {
            if e.is_retryable() {
                tracing::warn!(namespace = %namespace, "Will retry on next sweep: {}", e);
            }
        }

        if let Some(state) = &health_state {
            state.set_ready(true).await;
            state.mark_sweep(unix_now());
        }
    }

    tracing::info!("ScaledObject suspender stopped");
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
