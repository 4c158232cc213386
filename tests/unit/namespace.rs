//! Tests for namespace sweeps

use std::sync::Arc;

use keda_suspender::Config;
use keda_suspender::controller::{
    Cancellation, Context, NamespaceTarget, RetryPolicy, reconcile_namespace, sweep,
};
use keda_suspender::health::Metrics;
use keda_suspender::suspension::{DesiredState, KEDA_PAUSED_REPLICAS};

use crate::common::*;

fn config() -> Config {
    Config {
        prefix: PREFIX.to_string(),
        retry: RetryPolicy::immediate(5),
        ..Config::default()
    }
}

#[tokio::test]
async fn test_reconcile_namespace_suspends_all_objects() {
    let store = Arc::new(InMemoryStore::with_objects([
        scaled_object("so1", "app1"),
        scaled_object("so2", "app2"),
        ScaledObjectBuilder::new("other", "elsewhere").build(),
    ]));
    let ctx = Context::new(store.clone(), &config());

    let corrected = reconcile_namespace(
        &ctx,
        &NamespaceTarget::new(NAMESPACE, DesiredState::Suspended),
        &Cancellation::never(),
    )
    .await
    .expect("reconcile");

    assert!(corrected);
    assert_eq!(store.updated(), vec!["so1", "so2"]);
    let other = store.object("elsewhere", "other").expect("other");
    assert_eq!(other.annotation(KEDA_PAUSED_REPLICAS), None);
}

#[tokio::test]
async fn test_sweep_isolates_failing_namespaces() {
    let store = Arc::new(InMemoryStore::with_objects([
        scaled_object("so1", "app1"),
        ScaledObjectBuilder::new("idle", "staging")
            .annotation(KEDA_PAUSED_REPLICAS, "0")
            .build(),
        ScaledObjectBuilder::new("broken", "batch").build(),
    ]));
    store.fail_list("batch", 403);
    let metrics = Arc::new(Metrics::new());
    let ctx = Context::with_metrics(store.clone(), &config(), metrics.clone());

    let report = sweep(
        &ctx,
        vec![
            NamespaceTarget::new(NAMESPACE, DesiredState::Suspended),
            NamespaceTarget::new("staging", DesiredState::Suspended),
            NamespaceTarget::new("batch", DesiredState::Suspended),
        ],
        &Cancellation::never(),
    )
    .await;

    assert_eq!(report.corrected, vec![NAMESPACE]);
    assert_eq!(report.conformant, vec!["staging"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "batch");
    assert!(!report.is_success());

    let encoded = metrics.encode();
    assert!(encoded.contains("keda_suspender_errors_total{namespace=\"batch\"} 1"));
    assert!(encoded.contains("keda_suspender_namespaces{posture=\"Suspended\"} 3"));
    assert!(encoded.contains(
        "keda_suspender_corrections_total{namespace=\"shop\",posture=\"Suspended\"} 1"
    ));
}

#[tokio::test]
async fn test_sweep_resumes_running_namespaces() {
    let store = Arc::new(InMemoryStore::with_objects([ScaledObjectBuilder::new(
        "so1", NAMESPACE,
    )
    .annotation(KEDA_PAUSED_REPLICAS, "0")
    .build()]));
    let ctx = Context::new(store.clone(), &config());

    let report = sweep(
        &ctx,
        vec![NamespaceTarget::new(NAMESPACE, DesiredState::Running)],
        &Cancellation::never(),
    )
    .await;

    assert!(report.is_success());
    assert_eq!(report.corrected, vec![NAMESPACE]);
    assert_eq!(store.stored("so1").annotation(KEDA_PAUSED_REPLICAS), None);
}

#[tokio::test]
async fn test_sweep_without_targets() {
    let store = Arc::new(InMemoryStore::new());
    let ctx = Context::new(store.clone(), &config());

    let report = sweep(&ctx, Vec::new(), &Cancellation::never()).await;

    assert!(report.is_success());
    assert!(report.corrected.is_empty());
    assert_eq!(store.get_calls(), 0);
}
