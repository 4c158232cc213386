//! Error types for the ScaledObject suspender

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// A fetch or update failed with something other than a conflict.
    /// The API error is kept unmodified as the source.
    #[error("failed to patch ScaledObject {namespace}/{name}: {source}")]
    PatchFailed {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error(
        "gave up patching ScaledObject {namespace}/{name} after {attempts} conflicting updates: {source}"
    )]
    ConflictRetriesExhausted {
        namespace: String,
        name: String,
        attempts: u32,
        #[source]
        source: kube::Error,
    },

    #[error("patching ScaledObject {namespace}/{name} was cancelled")]
    Cancelled { namespace: String, name: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid desired state '{0}' (expected 'Running' or 'Suspended')")]
    InvalidDesiredState(String),
}

/// HTTP status the API server uses for optimistic concurrency failures
pub const CONFLICT_CODE: u16 = 409;
/// HTTP status for a missing object
pub const NOT_FOUND_CODE: u16 = 404;

/// Whether a kube error is a write-write conflict on `resourceVersion`
pub fn is_conflict(e: &kube::Error) -> bool {
    matches!(e, kube::Error::Api(api_err) if api_err.code == CONFLICT_CODE)
}

/// Whether a kube error reports a missing object
pub fn is_not_found(e: &kube::Error) -> bool {
    matches!(e, kube::Error::Api(api_err) if api_err.code == NOT_FOUND_CODE)
}

impl Error {
    /// Underlying API error, if this error came from the API server
    pub fn api_error(&self) -> Option<&kube::Error> {
        match self {
            Error::KubeError(e)
            | Error::PatchFailed { source: e, .. }
            | Error::ConflictRetriesExhausted { source: e, .. } => Some(e),
            _ => None,
        }
    }

    /// Check if this error indicates the ScaledObject no longer exists
    pub fn is_not_found(&self) -> bool {
        self.api_error().is_some_and(is_not_found)
    }

    /// Check if this error is an (exhausted) conflict
    pub fn is_conflict(&self) -> bool {
        self.api_error().is_some_and(is_conflict)
    }

    /// Check if re-running the whole sweep later could help
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::KubeError(e) | Error::PatchFailed { source: e, .. } => match e {
                kube::Error::Api(api_err) => {
                    // 4xx errors (except 409 Conflict, 429 TooManyRequests) are usually not retryable
                    let code = api_err.code;
                    if (400..500).contains(&code) {
                        return code == CONFLICT_CODE || code == 429;
                    }
                    true
                }
                // Network and other errors are retryable
                _ => true,
            },
            Error::ConflictRetriesExhausted { .. } => true,
            Error::Cancelled { .. } => false,
            Error::InvalidConfig(_) => false,
            Error::InvalidDesiredState(_) => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
