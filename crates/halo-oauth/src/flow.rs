//! In-flight authorization flow state.
//!
//! One record per pending browser authorization, keyed by the anti-CSRF
//! state token. Records are single-use and expire after [`FLOW_TTL`]; a
//! background sweeper drops abandoned flows so the table cannot grow
//! unboundedly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

/// How long a pending flow stays valid before it is swept.
pub const FLOW_TTL_SECS: i64 = 600;

/// How often the sweeper runs.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Everything needed to finish one authorization flow at callback time.
///
/// Never persisted; lives only in the [`FlowStore`].
#[derive(Debug, Clone)]
pub struct FlowState {
    /// Connector this flow belongs to.
    pub connector: String,
    /// The connector's endpoint URL (the protected resource origin).
    pub connector_url: String,
    /// PKCE code verifier, revealed only to the token endpoint.
    pub code_verifier: String,
    /// Redirect URI used in the authorization request; must be repeated
    /// verbatim in the exchange.
    pub redirect_uri: String,
    /// Registered client id.
    pub client_id: String,
    /// Token endpoint for the exchange.
    pub token_url: String,
    /// RFC 8707 resource indicator, when advertised.
    pub resource: Option<String>,
    /// When the flow was started.
    pub created_at: DateTime<Utc>,
}

impl FlowState {
    /// Whether this flow has outlived the TTL at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::seconds(FLOW_TTL_SECS)
    }
}

/// Pending flows keyed by state token.
#[derive(Debug, Default)]
pub struct FlowStore {
    flows: Mutex<HashMap<String, FlowState>>,
}

impl FlowStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, FlowState>> {
        self.flows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a pending flow under its state token.
    pub fn insert(&self, state: String, flow: FlowState) {
        debug!(connector = flow.connector, "Flow state registered");
        self.lock().insert(state, flow);
    }

    /// Atomically remove and return the flow for `state`.
    ///
    /// Single use: a second call with the same token returns `None`. A flow
    /// that sat past its TTL is dropped here too, in case the callback
    /// races the sweeper.
    pub fn take(&self, state: &str, now: DateTime<Utc>) -> Option<FlowState> {
        let flow = self.lock().remove(state)?;
        if flow.is_expired(now) {
            debug!(connector = flow.connector, "Flow state expired at consumption");
            return None;
        }
        Some(flow)
    }

    /// Drop every flow older than the TTL; returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut flows = self.lock();
        let before = flows.len();
        flows.retain(|_, flow| !flow.is_expired(now));
        let removed = before - flows.len();
        if removed > 0 {
            debug!(removed, remaining = flows.len(), "Swept expired flow state");
        } else {
            trace!(pending = flows.len(), "Sweep found nothing expired");
        }
        removed
    }

    /// Number of pending flows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no flows are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Spawn the periodic sweeper for `store`.
///
/// Runs until aborted or the store is dropped by the caller; each tick
/// removes flows older than [`FLOW_TTL_SECS`].
pub fn spawn_sweeper(store: Arc<FlowStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            store.sweep(Utc::now());
        }
    })
}
