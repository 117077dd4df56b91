//! The capability orchestrator.
//!
//! Owns the per-session set of dynamically activated connectors and the
//! agent-facing operations: `environment`, `discover`, `activate`,
//! `deactivate`. Dynamic activation is session-scoped only; it never
//! survives a session boundary and never writes to configuration.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use halo_core::{ConfigStore, ConnectorEvent, EventBus, LaunchSpec, SessionHandle};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::admission::{
    self, ActivationWindow, CapacityDecision, MAX_ACTIVE, RATE_MAX,
};
use crate::discover::DiscoveryIndex;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::hygiene;
use crate::readiness::{classify, ConnectorStatus, Readiness};
use crate::registry;

/// Per-session activation state. Created on bind, dropped on unbind.
struct SessionState {
    handle: Arc<dyn SessionHandle>,
    /// Connectors activated after boot, session-scoped only.
    dynamic: HashMap<String, LaunchSpec>,
    /// Rate-limit window over successful activations.
    window: ActivationWindow,
}

impl SessionState {
    fn new(handle: Arc<dyn SessionHandle>) -> Self {
        Self {
            handle,
            dynamic: HashMap::new(),
            window: ActivationWindow::new(),
        }
    }
}

/// Full readiness report for the agent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentReport {
    /// Connector slots in use.
    pub active_count: usize,
    /// Maximum slots.
    pub max_active: usize,
    /// Connectors dynamically activated in this session.
    pub dynamic_count: usize,
    /// All connectors with their readiness, stably sorted.
    pub connectors: Vec<ConnectorStatus>,
}

impl EnvironmentReport {
    /// Render the report as agent-readable text.
    #[must_use]
    pub fn summary(&self) -> String {
        let bucket = |r: Readiness| self.connectors.iter().filter(move |s| s.status == r);

        let mut lines = vec![format!(
            "Connector environment: {}/{} active slots used",
            self.active_count, self.max_active
        )];

        lines.push(format!("Active ({}):", bucket(Readiness::Active).count()));
        for s in bucket(Readiness::Active) {
            let core = if s.is_core { " [core]" } else { "" };
            lines.push(format!("  - {}: {}{core}", s.name, s.description));
        }

        lines.push(format!(
            "Available, can activate ({}):",
            bucket(Readiness::Available).count()
        ));
        for s in bucket(Readiness::Available) {
            lines.push(format!("  - {}: {}", s.name, s.description));
        }

        lines.push(format!(
            "Missing credentials ({}):",
            bucket(Readiness::MissingCredentials).count()
        ));
        for s in bucket(Readiness::MissingCredentials) {
            lines.push(format!("  - {}: needs {}", s.name, s.missing_env_keys.join(", ")));
        }

        lines.push(format!(
            "Dynamic connectors this session: {}",
            self.dynamic_count
        ));
        lines.join("\n")
    }
}

/// Discovery result for one intent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    /// The intent that was matched.
    pub intent: String,
    /// Matching connectors, ranked, with readiness.
    pub matches: Vec<ConnectorStatus>,
    /// Set when nothing matched; not an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

/// Successful activation result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum ActivateOutcome {
    /// The connector was loaded into the session.
    #[serde(rename_all = "camelCase")]
    Activated {
        /// The connector name.
        connector: String,
        /// Slots in use after activation.
        active_count: usize,
        /// Maximum slots.
        max_active: usize,
        /// Per-connector warnings reported by the session apply.
        #[serde(skip_serializing_if = "HashMap::is_empty")]
        warnings: HashMap<String, String>,
    },
    /// The connector was already active; nothing changed.
    #[serde(rename_all = "camelCase")]
    AlreadyActive {
        /// The connector name.
        connector: String,
        /// True when active via this session's dynamic set, false when
        /// active since boot.
        dynamic: bool,
    },
}

/// Successful deactivation result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateOutcome {
    /// The connector name.
    pub connector: String,
    /// Slots in use after the slot was freed.
    pub active_count: usize,
    /// Maximum slots.
    pub max_active: usize,
}

/// The capability orchestrator.
///
/// Takes its configuration store and event bus by injection; owns the
/// session activation state for the lifetime of one bound session.
pub struct Orchestrator {
    store: Arc<dyn ConfigStore>,
    events: EventBus,
    session: Mutex<Option<SessionState>>,
}

impl Orchestrator {
    /// Create an orchestrator over the given store and event bus.
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>, events: EventBus) -> Self {
        Self {
            store,
            events,
            session: Mutex::new(None),
        }
    }

    /// Bind a live session, resetting all per-session state.
    pub async fn bind_session(&self, handle: Arc<dyn SessionHandle>) {
        let mut session = self.session.lock().await;
        *session = Some(SessionState::new(handle));
        debug!("Session bound; dynamic connector state reset");
    }

    /// Unbind the session, dropping all per-session state.
    pub async fn unbind_session(&self) {
        let mut session = self.session.lock().await;
        *session = None;
        debug!("Session unbound; dynamic connector state cleared");
    }

    /// Disable enabled connectors whose credentials are placeholders.
    ///
    /// Run at the configuration boundary (import, boot): an entry that
    /// cannot work is disabled in place instead of failing at session
    /// start. Returns the names that were disabled, sorted. Idempotent;
    /// native subsystems and already-disabled entries are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read or written.
    pub fn auto_disable_placeholders(&self) -> OrchestratorResult<Vec<String>> {
        let file = self.store.load()?;

        let mut quarantined = Vec::new();
        for (name, config) in &file.connectors {
            if registry::is_native_subsystem(name) || config.disabled {
                continue;
            }
            if hygiene::has_placeholder_values(config) {
                self.store.set_disabled(name, true)?;
                warn!(connector = name, "Disabling connector with placeholder credentials");
                quarantined.push(name.clone());
            }
        }

        quarantined.sort();
        Ok(quarantined)
    }

    /// Full readiness report with active/max counts.
    ///
    /// Works without a bound session (read-only).
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read.
    pub async fn environment(&self) -> OrchestratorResult<EnvironmentReport> {
        let file = self.store.load()?;
        let connectors = classify(&file.connectors);

        let session = self.session.lock().await;
        let (dynamic_count, active_count) = match session.as_ref() {
            Some(state) => (
                state.dynamic.len(),
                admission::active_count(&file.connectors, &state.dynamic),
            ),
            None => (0, admission::active_count(&file.connectors, &HashMap::new())),
        };

        Ok(EnvironmentReport {
            active_count,
            max_active: MAX_ACTIVE,
            dynamic_count,
            connectors,
        })
    }

    /// Find connectors relevant to a free-text intent.
    ///
    /// An empty match set is not an error; the report carries guidance
    /// instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read.
    pub async fn discover(&self, intent: &str) -> OrchestratorResult<DiscoveryReport> {
        let file = self.store.load()?;
        let statuses = classify(&file.connectors);
        let matches = DiscoveryIndex::shared().discover(intent, &statuses);

        let guidance = matches.is_empty().then(|| {
            format!(
                "No connectors match \"{intent}\". Use environment() to see everything available."
            )
        });

        debug!(intent, matches = matches.len(), "Discovery query");

        Ok(DiscoveryReport {
            intent: intent.to_string(),
            matches,
            guidance,
        })
    }

    /// Dynamically load a connector into the bound session.
    ///
    /// Idempotent for connectors that are already active (dynamically or
    /// since boot). On success the *entire* dynamic set is reapplied to the
    /// session; a failed apply leaves the prior set intact.
    ///
    /// # Errors
    ///
    /// See [`OrchestratorError`]: no session, rate-limited, unknown
    /// connector, missing credentials, capacity exhausted, or apply failure.
    pub async fn activate(&self, name: &str) -> OrchestratorResult<ActivateOutcome> {
        let mut guard = self.session.lock().await;
        let state = guard.as_mut().ok_or(OrchestratorError::NoSession)?;

        let now = Utc::now();
        if state.window.is_limited(now) {
            return Err(OrchestratorError::RateLimited {
                max: RATE_MAX,
                retry_after_secs: state.window.retry_after_secs(now),
            });
        }

        let file = self.store.load()?;
        let Some(config) = file.connectors.get(name) else {
            return Err(OrchestratorError::UnknownConnector {
                name: name.to_string(),
            });
        };

        if state.dynamic.contains_key(name) {
            return Ok(ActivateOutcome::AlreadyActive {
                connector: name.to_string(),
                dynamic: true,
            });
        }

        let has_placeholders = hygiene::has_placeholder_values(config);
        if !config.disabled && !has_placeholders {
            // Already loaded at session start; nothing to do.
            return Ok(ActivateOutcome::AlreadyActive {
                connector: name.to_string(),
                dynamic: false,
            });
        }

        if has_placeholders {
            return Err(OrchestratorError::MissingCredentials {
                name: name.to_string(),
                keys: hygiene::placeholder_env_keys(config),
            });
        }

        if let CapacityDecision::Exhausted { active, candidates } =
            admission::check_capacity(&file.connectors, &state.dynamic)
        {
            return Err(OrchestratorError::AtCapacity {
                name: name.to_string(),
                active,
                max: MAX_ACTIVE,
                candidates,
            });
        }

        let mut next = state.dynamic.clone();
        next.insert(name.to_string(), config.launch_spec(now));

        let report = state
            .handle
            .apply_connector_set(next.clone())
            .await
            .map_err(|e| OrchestratorError::ApplyFailed {
                reason: e.to_string(),
            })?;

        if !report.is_clean() {
            warn!(connector = name, warnings = ?report.errors, "Session reported apply warnings");
        }

        state.dynamic = next;
        state.window.record(now);
        self.events.publish(ConnectorEvent::Activated {
            connector: name.to_string(),
        });

        let active_count = admission::active_count(&file.connectors, &state.dynamic);
        info!(connector = name, active_count, "Connector activated dynamically");

        Ok(ActivateOutcome::Activated {
            connector: name.to_string(),
            active_count,
            max_active: MAX_ACTIVE,
            warnings: report.errors,
        })
    }

    /// Unload a dynamically activated, non-core connector from the session.
    ///
    /// # Errors
    ///
    /// See [`OrchestratorError`]: core connector, no session, not
    /// dynamically activated, or apply failure.
    pub async fn deactivate(&self, name: &str) -> OrchestratorResult<DeactivateOutcome> {
        if registry::is_core(name) {
            return Err(OrchestratorError::CoreConnector {
                name: name.to_string(),
            });
        }

        let mut guard = self.session.lock().await;
        let state = guard.as_mut().ok_or(OrchestratorError::NoSession)?;

        if !state.dynamic.contains_key(name) {
            return Err(OrchestratorError::NotDynamicallyActivated {
                name: name.to_string(),
            });
        }

        let mut next = state.dynamic.clone();
        next.remove(name);

        state
            .handle
            .apply_connector_set(next.clone())
            .await
            .map_err(|e| OrchestratorError::ApplyFailed {
                reason: e.to_string(),
            })?;

        state.dynamic = next;
        self.events.publish(ConnectorEvent::Deactivated {
            connector: name.to_string(),
        });

        let file = self.store.load()?;
        let active_count = admission::active_count(&file.connectors, &state.dynamic);
        info!(connector = name, active_count, "Connector deactivated, slot freed");

        Ok(DeactivateOutcome {
            connector: name.to_string(),
            active_count,
            max_active: MAX_ACTIVE,
        })
    }
}
