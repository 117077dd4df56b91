//! Live-session seam.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::LaunchSpec;
use crate::error::CoreResult;

/// Outcome of applying a connector set to the live session.
///
/// The apply operation is total: the session replaces its dynamic connector
/// set wholesale, and per-connector failures are reported here without
/// corrupting the others.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    /// Per-connector error messages, empty on full success.
    pub errors: HashMap<String, String>,
}

impl ApplyReport {
    /// A fully successful apply.
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    /// Whether every connector applied cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Handle to a running agent session.
///
/// The orchestrator pushes the *entire* dynamic connector set on every
/// change rather than a delta; implementations must treat the call as a
/// replacement.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Replace the session's dynamic connector set.
    ///
    /// # Errors
    ///
    /// Returns an error only when the set could not be applied at all
    /// (e.g. the session is gone); individual connector failures belong in
    /// the [`ApplyReport`].
    async fn apply_connector_set(
        &self,
        set: HashMap<String, LaunchSpec>,
    ) -> CoreResult<ApplyReport>;
}
