//! Readiness classification.
//!
//! Derives a per-connector status from the persisted config plus credential
//! hygiene. Pure: no side effects, no I/O.

use std::collections::HashMap;
use std::fmt;

use halo_core::ConnectorConfig;
use serde::Serialize;

use crate::hygiene;
use crate::registry::{self, ConnectorCategory};

/// Derived status of one connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Readiness {
    /// Enabled with usable credentials; loaded into sessions.
    Active,
    /// Disabled but ready to activate.
    Available,
    /// Carries placeholder credentials; cannot be activated as-is.
    MissingCredentials,
}

impl Readiness {
    fn sort_order(self) -> u32 {
        match self {
            Self::Active => 0,
            Self::Available => 1,
            Self::MissingCredentials => 2,
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Available => write!(f, "available"),
            Self::MissingCredentials => write!(f, "missing-credentials"),
        }
    }
}

/// One connector's readiness together with its registry metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorStatus {
    /// Connector name.
    pub name: String,
    /// Derived readiness.
    pub status: Readiness,
    /// Registry category (`Other` for unregistered names).
    pub category: ConnectorCategory,
    /// Whether the connector is core.
    pub is_core: bool,
    /// English description.
    pub description: String,
    /// Env keys holding placeholder values (missing-credentials only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_env_keys: Vec<String>,
}

/// Classify every configured connector.
///
/// Native subsystems are skipped. Output is sorted active → available →
/// missing-credentials, then by category and registry sort order, then by
/// name, for stable presentation.
#[must_use]
pub fn classify(connectors: &HashMap<String, ConnectorConfig>) -> Vec<ConnectorStatus> {
    let mut results: Vec<ConnectorStatus> = connectors
        .iter()
        .filter(|(name, _)| !registry::is_native_subsystem(name))
        .map(|(name, config)| {
            let meta = registry::meta(name);
            let missing_env_keys = hygiene::placeholder_env_keys(config);

            let status = if hygiene::has_placeholder_values(config) {
                Readiness::MissingCredentials
            } else if config.disabled {
                Readiness::Available
            } else {
                Readiness::Active
            };

            ConnectorStatus {
                name: name.clone(),
                status,
                category: meta.map_or(ConnectorCategory::Other, |m| m.category),
                is_core: meta.is_some_and(|m| m.is_core),
                description: registry::description(name),
                missing_env_keys,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        a.status
            .sort_order()
            .cmp(&b.status.sort_order())
            .then(a.category.sort_order().cmp(&b.category.sort_order()))
            .then_with(|| {
                let sa = registry::meta(&a.name).map_or(u32::MAX, |m| m.sort_order);
                let sb = registry::meta(&b.name).map_or(u32::MAX, |m| m.sort_order);
                sa.cmp(&sb)
            })
            .then_with(|| a.name.cmp(&b.name))
    });

    results
}
