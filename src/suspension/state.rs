//! Desired posture and derived suspension state of a ScaledObject
//!
//! Suspension is never stored as a field of its own. It is read back from
//! annotations and the scale target name, which is why both encodings in use
//! (rename-based and KEDA pause annotation) are recognised here.

use std::fmt;
use std::str::FromStr;

use crate::controller::error::Error;
use crate::crd::ScaledObject;

/// Annotation suffix under which the pre-suspension target name is recorded
pub const ORIGINAL_SCALE_TARGET_REF_NAME: &str = "originalScaleTargetRefName";

/// Namespace annotation suffix carrying the desired posture
pub const DESIRED_STATE: &str = "desiredState";

/// Suffix appended to the target name by the rename encoding
pub const SUSPEND_SUFFIX: &str = "-suspend";

/// KEDA's own pause annotation; KEDA holds the target at this many replicas
pub const KEDA_PAUSED_REPLICAS: &str = "autoscaling.keda.sh/paused-replicas";

/// Value written to [`KEDA_PAUSED_REPLICAS`] when suspending
pub const KEDA_PAUSED_REPLICAS_VALUE: &str = "0";

/// Annotation prefix used when none is configured
pub const DEFAULT_PREFIX: &str = "kube-ns-suspender/";

/// Full annotation key recording the original target name
pub fn original_name_key(prefix: &str) -> String {
    format!("{prefix}{ORIGINAL_SCALE_TARGET_REF_NAME}")
}

/// Full namespace annotation key carrying the desired posture
pub fn desired_state_key(prefix: &str) -> String {
    format!("{prefix}{DESIRED_STATE}")
}

/// Target name used while suspended under the rename encoding
pub fn suspended_name(name: &str) -> String {
    format!("{name}{SUSPEND_SUFFIX}")
}

/// Recorded original target name, ignoring empty values
pub fn recorded_original_name<'a>(so: &'a ScaledObject, prefix: &str) -> Option<&'a str> {
    so.annotation(&original_name_key(prefix))
        .filter(|name| !name.is_empty())
}

/// Whether KEDA's pause annotation is present
pub fn has_pause_annotation(so: &ScaledObject) -> bool {
    so.annotation(KEDA_PAUSED_REPLICAS).is_some()
}

/// Original name if the object is currently renamed by the rename encoding
pub fn legacy_original_name<'a>(so: &'a ScaledObject, prefix: &str) -> Option<&'a str> {
    recorded_original_name(so, prefix)
        .filter(|original| so.scale_target_name() == suspended_name(original))
}

/// Fleet-wide posture requested for a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DesiredState {
    /// ScaledObjects drive autoscaling of their original targets
    Running,
    /// ScaledObjects are paused
    Suspended,
}

impl DesiredState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesiredState::Running => "Running",
            DesiredState::Suspended => "Suspended",
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DesiredState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Running" => Ok(DesiredState::Running),
            "Suspended" => Ok(DesiredState::Suspended),
            other => Err(Error::InvalidDesiredState(other.to_string())),
        }
    }
}

/// How a suspended ScaledObject was suspended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuspendedBy {
    /// Target renamed to `<original>-suspend`, original recorded in an annotation
    LegacyRename { original_name: String },
    /// KEDA pause annotation set
    AnnotationSentinel,
}

/// Suspension state derived from a ScaledObject
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuspensionState {
    Running,
    Suspended(SuspendedBy),
}

impl SuspensionState {
    /// Read the state back from either encoding.
    ///
    /// The pause annotation takes precedence when an object carries both.
    pub fn observe(so: &ScaledObject, prefix: &str) -> Self {
        if has_pause_annotation(so) {
            return SuspensionState::Suspended(SuspendedBy::AnnotationSentinel);
        }
        match legacy_original_name(so, prefix) {
            Some(original) => SuspensionState::Suspended(SuspendedBy::LegacyRename {
                original_name: original.to_string(),
            }),
            None => SuspensionState::Running,
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, SuspensionState::Suspended(_))
    }
}
