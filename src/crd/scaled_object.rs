//! KEDA ScaledObject custom resource
//!
//! Only the fields this operator reads or rewrites are modelled explicitly.
//! Everything else, at every nesting level (spec, target reference, triggers,
//! authentication references and status), is carried through `extra` so that
//! a full `replace` never drops fields owned by KEDA or the user.

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ScaledObject binds a KEDA autoscaler to a target workload
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "keda.sh",
    version = "v1alpha1",
    kind = "ScaledObject",
    plural = "scaledobjects",
    shortname = "so",
    namespaced,
    derive = "PartialEq",
    status = "ScaledObjectStatus",
    printcolumn = r#"{"name":"Target", "type":"string", "jsonPath":".spec.scaleTargetRef.name"}"#,
    printcolumn = r#"{"name":"Min", "type":"integer", "jsonPath":".spec.minReplicaCount"}"#,
    printcolumn = r#"{"name":"Max", "type":"integer", "jsonPath":".spec.maxReplicaCount"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ScaledObjectSpec {
    /// Reference to the workload KEDA scales
    pub scale_target_ref: ScaleTargetRef,

    /// Minimum replica count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replica_count: Option<i32>,

    /// Maximum replica count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replica_count: Option<i32>,

    /// Cooldown period after scale down (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_period: Option<i32>,

    /// Polling interval for checking triggers (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_interval: Option<i32>,

    /// Scaling triggers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<ScaleTrigger>,

    /// Spec fields not modelled here (advanced, fallback, idleReplicaCount, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Reference to the target resource to scale
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScaleTargetRef {
    /// Name of the target resource
    pub name: String,

    /// API version of the target (defaults to apps/v1 in KEDA)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Kind of the target (defaults to Deployment in KEDA)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Container whose environment feeds trigger metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_source_container_name: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// KEDA scaling trigger
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScaleTrigger {
    /// Trigger type (cpu, prometheus, kafka, ...)
    #[serde(rename = "type")]
    pub type_: String,

    /// Optional trigger name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Metric type for the trigger (Utilization, AverageValue, Value)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<String>,

    /// Trigger-specific metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Optional authentication reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_ref: Option<AuthenticationRef>,

    /// Trigger fields not modelled here (useCachedMetrics, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Reference to KEDA TriggerAuthentication
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationRef {
    /// Name of the TriggerAuthentication resource
    pub name: String,

    /// TriggerAuthentication or ClusterTriggerAuthentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Status written by the KEDA controller. Opaque to this operator.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScaledObjectStatus {
    /// Replica count KEDA observed before it started managing the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_replica_count: Option<i32>,

    /// Replica count KEDA holds the target at while paused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_replica_count: Option<i32>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ScaledObject {
    /// Name of the workload this ScaledObject currently targets
    pub fn scale_target_name(&self) -> &str {
        &self.spec.scale_target_ref.name
    }

    /// Annotation value, if present
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations().get(key).map(String::as_str)
    }

    /// Namespace of the object, defaulting to `default` for objects built without one
    pub fn namespace_or_default(&self) -> String {
        self.namespace().unwrap_or_else(|| "default".to_string())
    }
}
