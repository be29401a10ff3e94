//! Disruption error types.

use thiserror::Error;

/// Errors produced by the arbiters' commit paths.
#[derive(Debug, Error)]
pub enum DisruptionError {
    /// The pod was not registered in any group when the maps were built.
    #[error("pod {0} is not part of a replicated group")]
    NotInReplicatedSet(String),

    /// The decision flipped between query and commit, or no approving
    /// decision was ever reached.
    #[error("cannot disrupt pod {pod}: {reason}")]
    BudgetExceeded { pod: String, reason: String },

    /// The patch calculators produced nothing to send to `/resize`.
    #[error("no resize patches were calculated for pod {0}")]
    NoPatches(String),

    #[error("failed to encode patch for pod {pod}: {source}")]
    Serialize {
        pod: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("attempt store error: {0}")]
    State(#[from] vpa_state::StateError),
}

pub type DisruptionResult<T> = Result<T, DisruptionError>;

/// Failures reported by the pod API client, surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("pod {0} not found")]
    NotFound(String),

    /// Eviction refused because it would violate a PodDisruptionBudget.
    #[error("too many requests for pod {pod}: {message}")]
    TooManyRequests { pod: String, message: String },

    #[error("conflict updating pod {0}")]
    Conflict(String),

    #[error("request for pod {0} was cancelled")]
    Cancelled(String),

    #[error("api error {code} for pod {pod}: {message}")]
    Api {
        pod: String,
        code: u16,
        message: String,
    },
}

impl ClientError {
    /// Whether the outer loop may reasonably try again next pass.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::NotFound(_) => false,
            ClientError::TooManyRequests { .. }
            | ClientError::Conflict(_)
            | ClientError::Cancelled(_) => true,
            ClientError::Api { code, .. } => *code >= 500,
        }
    }
}

/// Failures from the workload index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("{kind} {namespace}/{name} is not available: {reason}")]
    Unavailable {
        kind: String,
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("controller kind {0} has no replica count in the index")]
    UnsupportedKind(String),
}

/// Failures from a patch calculator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("patch calculation failed for pod {pod}: {reason}")]
    Calculation { pod: String, reason: String },
}
