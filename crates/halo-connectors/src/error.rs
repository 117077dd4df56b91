//! Orchestrator error types.

use halo_core::CoreError;
use thiserror::Error;

fn fmt_keys(keys: &[String]) -> String {
    keys.join(", ")
}

fn fmt_candidates(candidates: &[String]) -> String {
    if candidates.is_empty() {
        "all active connectors are boot-configured or core; no slot can be freed automatically"
            .to_string()
    } else {
        format!("deactivate one of these first: {}", candidates.join(", "))
    }
}

/// Errors from orchestrator operations.
///
/// Every variant renders actionable, human-readable guidance; none of them
/// is fatal to the hosting process, and a failed operation leaves the
/// session in its prior valid state.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No live session is bound.
    #[error("no active session; connectors can only be activated inside a conversation")]
    NoSession,

    /// The activation rate limit was hit.
    #[error(
        "rate limit exceeded: at most {max} activations per minute; retry in {retry_after_secs}s"
    )]
    RateLimited {
        /// Maximum activations per window.
        max: usize,
        /// Seconds until the next activation would be admitted.
        retry_after_secs: i64,
    },

    /// The connector is not present in the configuration.
    #[error("connector \"{name}\" is not configured; check environment() for available connectors")]
    UnknownConnector {
        /// The requested name.
        name: String,
    },

    /// The connector carries placeholder credentials.
    #[error("cannot activate \"{name}\": missing credentials ({})", fmt_keys(.keys))]
    MissingCredentials {
        /// The connector name.
        name: String,
        /// Env keys holding placeholder values.
        keys: Vec<String>,
    },

    /// Every connector slot is in use.
    #[error(
        "cannot activate \"{name}\": {active} of {max} connector slots in use; {}",
        fmt_candidates(.candidates)
    )]
    AtCapacity {
        /// The connector name.
        name: String,
        /// Slots currently in use.
        active: usize,
        /// Maximum slots.
        max: usize,
        /// Dynamically-activated, non-core connectors that could be freed.
        candidates: Vec<String>,
    },

    /// Core connectors are never removable.
    #[error("cannot deactivate \"{name}\": core connectors must remain active")]
    CoreConnector {
        /// The connector name.
        name: String,
    },

    /// Only connectors activated dynamically in this session can be
    /// deactivated.
    #[error(
        "cannot deactivate \"{name}\": it was not dynamically activated in this session"
    )]
    NotDynamicallyActivated {
        /// The connector name.
        name: String,
    },

    /// The live session rejected the connector set.
    #[error("failed to apply connector set: {reason}")]
    ApplyFailed {
        /// Underlying failure.
        reason: String,
    },

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] CoreError),
}

/// Result type for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
