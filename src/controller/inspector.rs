//! Conformity inspection of a batch of ScaledObjects
//!
//! The inspector compares a snapshot of ScaledObjects with a desired posture
//! and hands every non-conformant object to the [`OptimisticPatcher`]. Objects
//! are independent of one another, but a batch stops at the first failed
//! correction and returns that error to the caller.

use std::sync::Arc;

use kube::ResourceExt;
use tracing::{debug, info, instrument};

use crate::controller::cancel::Cancellation;
use crate::controller::error::Result;
use crate::controller::patcher::{ObjectId, OptimisticPatcher, PatchOutcome};
use crate::crd::ScaledObject;
use crate::health::Metrics;
use crate::suspension::{Correction, DesiredState, Encoding};

/// A correction decided from a snapshot, not yet applied
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedCorrection {
    pub id: ObjectId,
    pub correction: Correction,
    /// Human readable transition, for logging
    pub transition: String,
}

/// Decides which ScaledObjects need correcting and applies the corrections
#[derive(Clone)]
pub struct ConformityInspector {
    patcher: OptimisticPatcher,
    encoding: Encoding,
    prefix: String,
    metrics: Option<Arc<Metrics>>,
}

impl ConformityInspector {
    pub fn new(patcher: OptimisticPatcher, encoding: Encoding, prefix: impl Into<String>) -> Self {
        Self {
            patcher,
            encoding,
            prefix: prefix.into(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Corrections needed for `objects` to conform to `desired`. Pure; no API calls.
    pub fn plan(&self, objects: &[ScaledObject], desired: DesiredState) -> Vec<PlannedCorrection> {
        objects
            .iter()
            .filter_map(|so| {
                let correction = self.encoding.correction_for(so, &self.prefix, desired)?;
                Some(PlannedCorrection {
                    id: ObjectId::of(so),
                    transition: correction.describe(so),
                    correction,
                })
            })
            .collect()
    }

    /// Bring `objects` to the posture `desired`.
    ///
    /// Returns whether at least one object needed a correction.
    pub async fn inspect(
        &self,
        objects: &[ScaledObject],
        desired: DesiredState,
        cancel: &Cancellation,
    ) -> Result<bool> {
        match desired {
            DesiredState::Running => self.inspect_for_running(objects, cancel).await,
            DesiredState::Suspended => {
                let planned = self.plan(objects, desired);
                let corrected = !planned.is_empty();
                self.apply_all(planned, desired, cancel).await?;
                Ok(corrected)
            }
        }
    }

    /// Resume every suspended object in `objects`.
    ///
    /// Returns whether at least one object needed a correction.
    #[instrument(skip_all, fields(objects = objects.len(), encoding = %self.encoding))]
    pub async fn inspect_for_running(
        &self,
        objects: &[ScaledObject],
        cancel: &Cancellation,
    ) -> Result<bool> {
        let planned = self.plan(objects, DesiredState::Running);
        let corrected = !planned.is_empty();
        self.apply_all(planned, DesiredState::Running, cancel)
            .await?;
        Ok(corrected)
    }

    /// Suspend every running object in `objects`. An empty batch is a no-op.
    #[instrument(skip_all, fields(objects = objects.len(), encoding = %self.encoding))]
    pub async fn inspect_for_suspended(
        &self,
        objects: &[ScaledObject],
        cancel: &Cancellation,
    ) -> Result<()> {
        if objects.is_empty() {
            return Ok(());
        }
        let planned = self.plan(objects, DesiredState::Suspended);
        self.apply_all(planned, DesiredState::Suspended, cancel)
            .await
    }

    async fn apply_all(
        &self,
        planned: Vec<PlannedCorrection>,
        desired: DesiredState,
        cancel: &Cancellation,
    ) -> Result<()> {
        for p in planned {
            info!(
                scaledobject = %p.id.name,
                namespace = %p.id.namespace,
                desired = %desired,
                "{}",
                p.transition
            );
            let outcome = self
                .patcher
                .patch(&p.id, &self.prefix, &p.correction, cancel)
                .await?;

            match outcome {
                PatchOutcome::AlreadyConformant => {
                    debug!(scaledobject = %p.id.name, "Corrected concurrently by another writer");
                }
                PatchOutcome::Updated { .. } => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_correction(&p.id.namespace, desired.as_str());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Names of the objects in `objects`, for log fields
pub fn object_names(objects: &[ScaledObject]) -> Vec<String> {
    objects.iter().map(|so| so.name_any()).collect()
}
