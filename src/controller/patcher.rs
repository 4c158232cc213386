//! Optimistic-concurrency patching of a single ScaledObject
//!
//! Every attempt re-fetches the object, replays the correction on that fresh
//! copy and submits a `resourceVersion`-guarded update. Only conflicts are
//! retried; not-found, permission and validation failures are returned
//! straight away.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use kube::ResourceExt;
use tracing::{debug, instrument, warn};

use crate::controller::cancel::Cancellation;
use crate::controller::error::{Error, Result, is_conflict};
use crate::controller::retry::RetryPolicy;
use crate::controller::store::ScaledObjectStore;
use crate::crd::ScaledObject;
use crate::health::Metrics;
use crate::suspension::Correction;

/// Identity of a ScaledObject
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub namespace: String,
    pub name: String,
}

impl ObjectId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn of(so: &ScaledObject) -> Self {
        Self::new(so.namespace_or_default(), so.name_any())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Result of a successful [`OptimisticPatcher::patch`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The update was accepted on attempt number `attempts`
    Updated { attempts: u32 },
    /// The latest revision already reflected the correction; nothing was written
    AlreadyConformant,
}

/// Applies corrections with fetch-mutate-update, retrying on conflict
#[derive(Clone)]
pub struct OptimisticPatcher {
    store: Arc<dyn ScaledObjectStore>,
    policy: RetryPolicy,
    metrics: Option<Arc<Metrics>>,
}

impl OptimisticPatcher {
    pub fn new(store: Arc<dyn ScaledObjectStore>, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Apply `correction` to the latest revision of `id`
    #[instrument(skip(self, correction, cancel), fields(scaledobject = %id))]
    pub async fn patch(
        &self,
        id: &ObjectId,
        prefix: &str,
        correction: &Correction,
        cancel: &Cancellation,
    ) -> Result<PatchOutcome> {
        let steps = self.policy.attempts();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let mut latest = self
                .cancellable(id, cancel, self.store.get(&id.namespace, &id.name))
                .await?
                .map_err(|source| self.failed(id, source))?;

            if !correction.apply(&mut latest, prefix) {
                debug!("Latest revision already matches the correction, skipping update");
                return Ok(PatchOutcome::AlreadyConformant);
            }

            let result = self
                .cancellable(id, cancel, self.store.update(&id.namespace, &latest))
                .await?;

            match result {
                Ok(_) => {
                    debug!(attempt, "ScaledObject updated");
                    return Ok(PatchOutcome::Updated { attempts: attempt });
                }
                Err(e) if is_conflict(&e) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_conflict(&id.namespace);
                    }
                    if attempt >= steps {
                        warn!(attempts = attempt, "Conflict retries exhausted");
                        return Err(Error::ConflictRetriesExhausted {
                            namespace: id.namespace.clone(),
                            name: id.name.clone(),
                            attempts: attempt,
                            source: e,
                        });
                    }
                    let delay = self.policy.delay_for_attempt(attempt - 1);
                    debug!(attempt, ?delay, "Conflict updating ScaledObject, retrying");
                    self.cancellable(id, cancel, tokio::time::sleep(delay))
                        .await?;
                }
                Err(source) => return Err(self.failed(id, source)),
            }
        }
    }

    /// Race `fut` against cancellation; cancellation wins ties
    async fn cancellable<F: Future>(
        &self,
        id: &ObjectId,
        cancel: &Cancellation,
        fut: F,
    ) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled {
                namespace: id.namespace.clone(),
                name: id.name.clone(),
            }),
            out = fut => Ok(out),
        }
    }

    fn failed(&self, id: &ObjectId, source: kube::Error) -> Error {
        Error::PatchFailed {
            namespace: id.namespace.clone(),
            name: id.name.clone(),
            source,
        }
    }
}
