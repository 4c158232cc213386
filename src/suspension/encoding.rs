//! Suspension encodings and the corrections they produce
//!
//! An [`Encoding`] decides whether a ScaledObject conforms to a desired
//! posture and, if not, which [`Correction`] brings it back in line. A
//! correction is later replayed against a freshly fetched copy of the object,
//! so it only describes intent and never carries the snapshot it was derived
//! from.

use std::fmt;
use std::str::FromStr;

use crate::controller::error::Error;
use crate::crd::ScaledObject;

use super::state::{
    DesiredState, KEDA_PAUSED_REPLICAS, KEDA_PAUSED_REPLICAS_VALUE, has_pause_annotation,
    legacy_original_name, original_name_key, recorded_original_name, suspended_name,
};

/// Scheme used to write suspension state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Rename the scale target to `<original>-suspend` and record the original
    LegacyRename,
    /// Set KEDA's pause annotation and leave the scale target alone
    #[default]
    AnnotationSentinel,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::LegacyRename => f.write_str("legacy"),
            Encoding::AnnotationSentinel => f.write_str("annotation"),
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "rename" => Ok(Encoding::LegacyRename),
            "annotation" | "sentinel" => Ok(Encoding::AnnotationSentinel),
            other => Err(Error::InvalidConfig(format!(
                "unknown suspension encoding '{other}' (expected 'annotation' or 'legacy')"
            ))),
        }
    }
}

/// A single mutation that brings one ScaledObject to the desired posture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correction {
    /// Rewrite the scale target name (rename encoding). Also clears KEDA's
    /// pause annotation so an object is never suspended by both encodings.
    Rename { target_name: String },
    /// Set or clear the pause annotation, optionally restoring a renamed target
    Annotation {
        pause: bool,
        restore_name: Option<String>,
    },
}

impl Encoding {
    /// Correction needed for `so` to conform to `desired`, or `None` if it already does
    pub fn correction_for(
        &self,
        so: &ScaledObject,
        prefix: &str,
        desired: DesiredState,
    ) -> Option<Correction> {
        match self {
            Encoding::LegacyRename => legacy_correction(so, prefix, desired),
            Encoding::AnnotationSentinel => annotation_correction(so, prefix, desired),
        }
    }

    /// Whether `so` is suspended as far as this encoding is concerned
    pub fn is_suspended(&self, so: &ScaledObject, prefix: &str) -> bool {
        match self {
            Encoding::LegacyRename => recorded_original_name(so, prefix)
                .is_some_and(|original| so.scale_target_name() != original),
            Encoding::AnnotationSentinel => has_pause_annotation(so),
        }
    }

    /// Suspend `so` in place. Returns whether anything changed.
    pub fn apply_suspend(&self, so: &mut ScaledObject, prefix: &str) -> bool {
        self.correction_for(so, prefix, DesiredState::Suspended)
            .is_some_and(|c| c.apply(so, prefix))
    }

    /// Resume `so` in place. Returns whether anything changed.
    pub fn apply_resume(&self, so: &mut ScaledObject, prefix: &str) -> bool {
        self.correction_for(so, prefix, DesiredState::Running)
            .is_some_and(|c| c.apply(so, prefix))
    }
}

fn legacy_correction(so: &ScaledObject, prefix: &str, desired: DesiredState) -> Option<Correction> {
    let current = so.scale_target_name();
    // Objects paused by the annotation encoding are migrated on the same write
    let keep_name = || {
        has_pause_annotation(so).then(|| Correction::Rename {
            target_name: current.to_string(),
        })
    };
    match desired {
        DesiredState::Running => match legacy_original_name(so, prefix) {
            Some(original) => Some(Correction::Rename {
                target_name: original.to_string(),
            }),
            None => keep_name(),
        },
        DesiredState::Suspended => match recorded_original_name(so, prefix) {
            Some(original) if original != current => keep_name(),
            // TODO: the original replica count annotation is not repaired here
            _ => Some(Correction::Rename {
                target_name: suspended_name(current),
            }),
        },
    }
}

fn annotation_correction(
    so: &ScaledObject,
    prefix: &str,
    desired: DesiredState,
) -> Option<Correction> {
    let paused = has_pause_annotation(so);
    // Objects still renamed by the rename encoding are migrated on the same write
    let restore_name = legacy_original_name(so, prefix).map(str::to_string);
    let pause = match desired {
        DesiredState::Running => false,
        DesiredState::Suspended => true,
    };

    if paused == pause && restore_name.is_none() {
        return None;
    }
    Some(Correction::Annotation {
        pause,
        restore_name,
    })
}

impl Correction {
    /// Apply this correction to `so`.
    ///
    /// The annotation map is copied, edited and written back as a whole.
    /// Returns `false` when `so` already reflects the correction.
    pub fn apply(&self, so: &mut ScaledObject, prefix: &str) -> bool {
        let key = original_name_key(prefix);
        let current_name = so.spec.scale_target_ref.name.clone();
        let current_annotations = so.metadata.annotations.clone().unwrap_or_default();

        let mut annotations = current_annotations.clone();
        let mut name = current_name.clone();

        match self {
            Correction::Rename { target_name } => {
                let recorded = annotations.get(&key).filter(|v| !v.is_empty()).cloned();
                match recorded {
                    Some(original) if original == *target_name => {
                        annotations.remove(&key);
                    }
                    Some(_) => {}
                    None if current_name != *target_name => {
                        annotations.insert(key, current_name.clone());
                    }
                    None => {}
                }
                annotations.remove(KEDA_PAUSED_REPLICAS);
                name = target_name.clone();
            }
            Correction::Annotation {
                pause,
                restore_name,
            } => {
                if *pause {
                    annotations.insert(
                        KEDA_PAUSED_REPLICAS.to_string(),
                        KEDA_PAUSED_REPLICAS_VALUE.to_string(),
                    );
                } else {
                    annotations.remove(KEDA_PAUSED_REPLICAS);
                }
                annotations.remove(&key);
                if let Some(restore) = restore_name {
                    name = restore.clone();
                }
            }
        }

        if annotations == current_annotations && name == current_name {
            return false;
        }
        so.metadata.annotations = Some(annotations);
        so.spec.scale_target_ref.name = name;
        true
    }

    /// Human readable description of what applying this correction to `so` does
    pub fn describe(&self, so: &ScaledObject) -> String {
        let current = so.scale_target_name();
        match self {
            Correction::Rename { target_name } => {
                let rename = format!("changing scaleTargetRef name from {current} to {target_name}");
                match (has_pause_annotation(so), current == target_name.as_str()) {
                    (true, true) => format!("removing {KEDA_PAUSED_REPLICAS}"),
                    (true, false) => format!("{rename}, removing {KEDA_PAUSED_REPLICAS}"),
                    (false, _) => rename,
                }
            }
            Correction::Annotation {
                pause,
                restore_name,
            } => {
                let action = if *pause {
                    format!("setting {KEDA_PAUSED_REPLICAS}={KEDA_PAUSED_REPLICAS_VALUE}")
                } else {
                    format!("removing {KEDA_PAUSED_REPLICAS}")
                };
                match restore_name {
                    Some(restore) => {
                        format!("{action}, restoring scaleTargetRef name from {current} to {restore}")
                    }
                    None => action,
                }
            }
        }
    }
}
