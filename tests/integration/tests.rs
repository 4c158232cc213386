//! Integration tests against a live API server
//!
//! ScaledObjects use a cron trigger so KEDA's admission webhook accepts them
//! without a metrics server. The tests only check what the suspender writes;
//! they do not wait for KEDA to act on it.

use std::collections::BTreeMap;
use std::sync::Arc;

use kube::api::PostParams;
use kube::{Api, Client, ResourceExt};

use keda_suspender::controller::{
    Cancellation, Context, KubeStore, NamespaceTarget, ScaledObjectStore, list_target_namespaces,
    reconcile_namespace, sweep,
};
use keda_suspender::crd::{ScaleTargetRef, ScaleTrigger, ScaledObject, ScaledObjectSpec};
use keda_suspender::suspension::{
    DEFAULT_PREFIX, DesiredState, Encoding, KEDA_PAUSED_REPLICAS, desired_state_key,
    original_name_key,
};
use keda_suspender::Config;

use crate::{TestNamespace, connect};

async fn setup(prefix: &str) -> (Client, TestNamespace) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,kube=warn")
        .with_test_writer()
        .try_init();

    let client = connect().await.expect("Failed to connect to cluster");
    let ns = TestNamespace::create(client.clone(), prefix)
        .await
        .expect("Failed to create test namespace");
    (client, ns)
}

fn cron_scaled_object(name: &str, target: &str) -> ScaledObject {
    ScaledObject::new(
        name,
        ScaledObjectSpec {
            scale_target_ref: ScaleTargetRef {
                name: target.to_string(),
                ..Default::default()
            },
            min_replica_count: Some(0),
            max_replica_count: Some(2),
            triggers: vec![ScaleTrigger {
                type_: "cron".to_string(),
                metadata: BTreeMap::from([
                    ("timezone".to_string(), "Etc/UTC".to_string()),
                    ("start".to_string(), "0 8 * * *".to_string()),
                    ("end".to_string(), "0 18 * * *".to_string()),
                    ("desiredReplicas".to_string(), "1".to_string()),
                ]),
                ..Default::default()
            }],
            ..Default::default()
        },
    )
}

async fn create(client: &Client, namespace: &str, so: &ScaledObject) {
    let api: Api<ScaledObject> = Api::namespaced(client.clone(), namespace);
    api.create(&PostParams::default(), so)
        .await
        .expect("Failed to create ScaledObject");
}

async fn fetch(client: &Client, namespace: &str, name: &str) -> ScaledObject {
    let api: Api<ScaledObject> = Api::namespaced(client.clone(), namespace);
    api.get(name).await.expect("Failed to get ScaledObject")
}

fn context(client: &Client, encoding: Encoding) -> Context {
    let config = Config {
        encoding,
        ..Config::default()
    };
    Context::new(Arc::new(KubeStore::new(client.clone())), &config)
}

#[tokio::test]
#[ignore = "requires Kubernetes cluster with KEDA"]
async fn test_annotation_suspend_and_resume() {
    let (client, ns) = setup("suspender-annotation").await;
    create(&client, ns.name(), &cron_scaled_object("worker", "worker")).await;
    let ctx = context(&client, Encoding::AnnotationSentinel);
    let cancel = Cancellation::never();

    let suspended = reconcile_namespace(
        &ctx,
        &NamespaceTarget::new(ns.name(), DesiredState::Suspended),
        &cancel,
    )
    .await
    .expect("suspend");
    assert!(suspended);

    let so = fetch(&client, ns.name(), "worker").await;
    assert_eq!(so.annotation(KEDA_PAUSED_REPLICAS), Some("0"));
    assert_eq!(so.scale_target_name(), "worker");
    // Fields not modelled explicitly survive the replace
    assert_eq!(so.spec.triggers.len(), 1);

    let resumed = reconcile_namespace(
        &ctx,
        &NamespaceTarget::new(ns.name(), DesiredState::Running),
        &cancel,
    )
    .await
    .expect("resume");
    assert!(resumed);

    let so = fetch(&client, ns.name(), "worker").await;
    assert_eq!(so.annotation(KEDA_PAUSED_REPLICAS), None);

    ns.cleanup().await.expect("cleanup");
}

#[tokio::test]
#[ignore = "requires Kubernetes cluster with KEDA"]
async fn test_legacy_suspend_and_resume() {
    let (client, ns) = setup("suspender-legacy").await;
    create(&client, ns.name(), &cron_scaled_object("worker", "worker")).await;
    let ctx = context(&client, Encoding::LegacyRename);
    let cancel = Cancellation::never();
    let key = original_name_key(DEFAULT_PREFIX);

    reconcile_namespace(
        &ctx,
        &NamespaceTarget::new(ns.name(), DesiredState::Suspended),
        &cancel,
    )
    .await
    .expect("suspend");

    let so = fetch(&client, ns.name(), "worker").await;
    assert_eq!(so.scale_target_name(), "worker-suspend");
    assert_eq!(so.annotation(&key), Some("worker"));

    // A second pass over the same namespace writes nothing
    let version = so.resource_version();
    let corrected = reconcile_namespace(
        &ctx,
        &NamespaceTarget::new(ns.name(), DesiredState::Suspended),
        &cancel,
    )
    .await
    .expect("re-suspend");
    assert!(!corrected);
    assert_eq!(fetch(&client, ns.name(), "worker").await.resource_version(), version);

    reconcile_namespace(
        &ctx,
        &NamespaceTarget::new(ns.name(), DesiredState::Running),
        &cancel,
    )
    .await
    .expect("resume");

    let so = fetch(&client, ns.name(), "worker").await;
    assert_eq!(so.scale_target_name(), "worker");
    assert_eq!(so.annotation(&key), None);

    ns.cleanup().await.expect("cleanup");
}

#[tokio::test]
#[ignore = "requires Kubernetes cluster with KEDA"]
async fn test_stale_update_is_a_conflict() {
    let (client, ns) = setup("suspender-conflict").await;
    create(&client, ns.name(), &cron_scaled_object("worker", "worker")).await;
    let store = KubeStore::new(client.clone());

    let stale = store.get(ns.name(), "worker").await.expect("get");
    let mut fresh = stale.clone();
    fresh.annotations_mut().insert("example.com/owner".into(), "test".into());
    store.update(ns.name(), &fresh).await.expect("first update");

    let err = store
        .update(ns.name(), &stale)
        .await
        .expect_err("stale update must be rejected");
    assert!(keda_suspender::controller::error::is_conflict(&err));

    ns.cleanup().await.expect("cleanup");
}

#[tokio::test]
#[ignore = "requires Kubernetes cluster with KEDA"]
async fn test_sweep_discovers_annotated_namespace() {
    let (client, ns) = setup("suspender-sweep").await;
    create(&client, ns.name(), &cron_scaled_object("worker", "worker")).await;
    ns.annotate(&desired_state_key(DEFAULT_PREFIX), Some("Suspended"))
        .await
        .expect("annotate");

    let targets = list_target_namespaces(client.clone(), DEFAULT_PREFIX, Some(ns.name()))
        .await
        .expect("list namespaces");
    assert_eq!(
        targets,
        vec![NamespaceTarget::new(ns.name(), DesiredState::Suspended)]
    );

    let ctx = context(&client, Encoding::AnnotationSentinel);
    let report = sweep(&ctx, targets, &Cancellation::never()).await;
    assert!(report.is_success());
    assert_eq!(report.corrected, vec![ns.name().to_string()]);

    let so = fetch(&client, ns.name(), "worker").await;
    assert_eq!(so.annotation(KEDA_PAUSED_REPLICAS), Some("0"));

    ns.cleanup().await.expect("cleanup");
}
