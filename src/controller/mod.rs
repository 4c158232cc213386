pub mod cancel;
pub mod context;
pub mod error;
pub mod inspector;
pub mod namespace;
pub mod patcher;
pub mod retry;
pub mod store;

pub use cancel::{CancelHandle, Cancellation, cancellation};
pub use context::Context;
pub use error::{Error, Result};
pub use inspector::{ConformityInspector, PlannedCorrection};
pub use namespace::{
    NamespaceTarget, SweepReport, desired_state_of, list_target_namespaces, reconcile_namespace,
    sweep,
};
pub use patcher::{ObjectId, OptimisticPatcher, PatchOutcome};
pub use retry::RetryPolicy;
pub use store::{KubeStore, ScaledObjectStore};
