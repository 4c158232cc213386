//! Namespace-level driver
//!
//! A namespace opts in by carrying the `<prefix>desiredState` annotation with
//! `Running` or `Suspended`. Each sweep lists those namespaces, then brings
//! every ScaledObject in them to the requested posture. Namespaces are
//! reconciled independently: one failing namespace never stops the others.

use std::time::Instant;

use futures::{StreamExt, stream};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::controller::cancel::Cancellation;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::inspector::object_names;
use crate::suspension::{DesiredState, desired_state_key};

/// A namespace and the posture it asks for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceTarget {
    pub namespace: String,
    pub desired: DesiredState,
}

impl NamespaceTarget {
    pub fn new(namespace: impl Into<String>, desired: DesiredState) -> Self {
        Self {
            namespace: namespace.into(),
            desired,
        }
    }
}

/// Outcome of one sweep over a set of namespaces
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Namespaces where at least one ScaledObject was corrected
    pub corrected: Vec<String>,
    /// Namespaces that already conformed
    pub conformant: Vec<String>,
    /// Namespaces whose reconciliation failed, with the error
    pub failed: Vec<(String, Error)>,
}

impl SweepReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Desired posture annotated on a namespace.
///
/// Returns `None` when the annotation is missing or holds an unknown value.
pub fn desired_state_of(ns: &Namespace, prefix: &str) -> Option<DesiredState> {
    let key = desired_state_key(prefix);
    let value = ns.annotations().get(&key)?;
    match value.parse() {
        Ok(desired) => Some(desired),
        Err(e) => {
            warn!(namespace = %ns.name_any(), annotation = %key, "Ignoring namespace: {}", e);
            None
        }
    }
}

/// List namespaces carrying a valid desired state annotation.
///
/// When `scope` is set only that namespace is considered.
pub async fn list_target_namespaces(
    client: Client,
    prefix: &str,
    scope: Option<&str>,
) -> Result<Vec<NamespaceTarget>> {
    let api: Api<Namespace> = Api::all(client);
    let namespaces = match scope {
        Some(name) => api.get_opt(name).await?.into_iter().collect(),
        None => api.list(&ListParams::default()).await?.items,
    };

    Ok(namespaces
        .iter()
        .filter_map(|ns| {
            desired_state_of(ns, prefix).map(|desired| NamespaceTarget::new(ns.name_any(), desired))
        })
        .collect())
}

/// Bring every ScaledObject in one namespace to its desired posture.
///
/// Returns whether anything was corrected.
#[instrument(skip(ctx, cancel), fields(namespace = %target.namespace, desired = %target.desired))]
pub async fn reconcile_namespace(
    ctx: &Context,
    target: &NamespaceTarget,
    cancel: &Cancellation,
) -> Result<bool> {
    let objects = ctx.store.list(&target.namespace).await?;
    debug!(scaledobjects = ?object_names(&objects), "Listed ScaledObjects");

    ctx.inspector
        .inspect(&objects, target.desired, cancel)
        .await
}

/// Reconcile `targets` with bounded concurrency
pub async fn sweep(
    ctx: &Context,
    targets: Vec<NamespaceTarget>,
    cancel: &Cancellation,
) -> SweepReport {
    let started = Instant::now();

    if let Some(metrics) = &ctx.metrics {
        for desired in [DesiredState::Running, DesiredState::Suspended] {
            let count = targets.iter().filter(|t| t.desired == desired).count();
            metrics.set_namespaces_by_posture(desired.as_str(), i64::try_from(count).unwrap_or(i64::MAX));
        }
    }

    let results: Vec<(NamespaceTarget, Result<bool>)> = stream::iter(targets)
        .map(|target| async move {
            let result = reconcile_namespace(ctx, &target, cancel).await;
            (target, result)
        })
        .buffer_unordered(ctx.concurrency)
        .collect()
        .await;

    let mut report = SweepReport::default();
    for (target, result) in results {
        match result {
            Ok(true) => report.corrected.push(target.namespace),
            Ok(false) => report.conformant.push(target.namespace),
            Err(e) => {
                error!(namespace = %target.namespace, "Reconciliation failed: {}", e);
                if let Some(metrics) = &ctx.metrics {
                    metrics.record_error(&target.namespace);
                }
                report.failed.push((target.namespace, e));
            }
        }
    }
    report.corrected.sort();
    report.conformant.sort();
    report.failed.sort_by(|a, b| a.0.cmp(&b.0));

    let elapsed = started.elapsed();
    if let Some(metrics) = &ctx.metrics {
        metrics.record_sweep(elapsed.as_secs_f64());
    }
    info!(
        corrected = report.corrected.len(),
        conformant = report.conformant.len(),
        failed = report.failed.len(),
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "Sweep completed"
    );

    report
}
