//! Shared helpers for encoding suspension state on ScaledObjects

pub mod encoding;
pub mod state;

pub use encoding::{Correction, Encoding};
pub use state::{
    DEFAULT_PREFIX, DesiredState, KEDA_PAUSED_REPLICAS, KEDA_PAUSED_REPLICAS_VALUE,
    ORIGINAL_SCALE_TARGET_REF_NAME, SUSPEND_SUFFIX, SuspendedBy, SuspensionState,
    desired_state_key, original_name_key, suspended_name,
};
