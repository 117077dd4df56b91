//! Connector configuration model.
//!
//! The persisted config file is JSON with a top-level `connectors` map.
//! Only `disabled` and `oauth` are ever mutated by this workspace; every
//! other field (including fields this version does not know about) is
//! preserved verbatim across writes via the flattened extras map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::credential::OAuthCredential;
use crate::error::{CoreError, CoreResult};

/// Resolved transport for a connector.
///
/// A connector entry is either process-backed (spawned locally) or
/// network-backed (reached over HTTP). Exactly one of the two must be
/// configured; `ConnectorConfig::transport` enforces this at the
/// configuration boundary so activation logic never sees an ambiguous shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport<'a> {
    /// Spawn `command` locally.
    Process {
        /// Command to run.
        command: &'a str,
    },
    /// Connect to `url` over HTTP.
    Network {
        /// Remote endpoint URL.
        url: &'a str,
    },
}

/// Configuration for a single connector, as persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorConfig {
    /// Command to run (process-backed connectors).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Arguments for the command.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Environment variables for the spawned process.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    /// Endpoint URL (network-backed connectors).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Extra HTTP headers for network-backed connectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    /// Whether the connector is disabled at boot.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    /// Persisted OAuth credential (network-backed connectors only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OAuthCredential>,
    /// Fields this version does not model, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConnectorConfig {
    /// Create a process-backed connector config.
    #[must_use]
    pub fn process(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::default()
        }
    }

    /// Create a network-backed connector config.
    #[must_use]
    pub fn network(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Add arguments (process-backed).
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable (process-backed).
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Mark as disabled at boot.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Attach an OAuth credential.
    #[must_use]
    pub fn with_oauth(mut self, oauth: OAuthCredential) -> Self {
        self.oauth = Some(oauth);
        self
    }

    /// Resolve the transport variant.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the entry names both a
    /// `command` and a `url`, or neither.
    pub fn transport(&self) -> CoreResult<Transport<'_>> {
        match (self.command.as_deref(), self.url.as_deref()) {
            (Some(command), None) => Ok(Transport::Process { command }),
            (None, Some(url)) => Ok(Transport::Network { url }),
            (Some(_), Some(_)) => Err(CoreError::InvalidConfig {
                name: String::new(),
                reason: "both command and url are set".to_string(),
            }),
            (None, None) => Err(CoreError::InvalidConfig {
                name: String::new(),
                reason: "neither command nor url is set".to_string(),
            }),
        }
    }

    /// Validate the entry shape, attributing errors to `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for ambiguous or empty shapes.
    pub fn validate(&self, name: &str) -> CoreResult<()> {
        self.transport().map(|_| ()).map_err(|e| match e {
            CoreError::InvalidConfig { reason, .. } => CoreError::InvalidConfig {
                name: name.to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Whether this connector is network-backed.
    #[must_use]
    pub fn is_network(&self) -> bool {
        self.url.is_some()
    }

    /// Build the launch spec handed to the live session.
    ///
    /// Strips `disabled`, `oauth` and unknown fields, and injects an
    /// `Authorization` bearer header when a still-valid token exists for a
    /// network-backed connector. Expired tokens are not injected; the
    /// connector then surfaces its own authentication failure rather than
    /// sending a stale credential.
    #[must_use]
    pub fn launch_spec(&self, now: DateTime<Utc>) -> LaunchSpec {
        let mut headers = self.headers.clone().unwrap_or_default();

        if self.url.is_some() {
            if let Some(oauth) = &self.oauth {
                if !oauth.is_expired(now) {
                    headers.insert("Authorization".to_string(), oauth.authorization_header());
                }
            }
        }

        LaunchSpec {
            command: self.command.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            url: self.url.clone(),
            headers,
        }
    }
}

/// Cleaned runtime shape of one connector, as applied to the live session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchSpec {
    /// Command to run (process-backed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Arguments for the command.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Environment variables.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    /// Endpoint URL (network-backed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// HTTP headers, with the bearer header injected when applicable.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// The persisted configuration file: `connectors` plus verbatim extras.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorsFile {
    /// All configured connectors, by name.
    #[serde(default)]
    pub connectors: HashMap<String, ConnectorConfig>,
    /// Top-level fields this core does not own, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConnectorsFile {
    /// Get a connector by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConnectorConfig> {
        self.connectors.get(name)
    }

    /// Validate every connector entry.
    ///
    /// # Errors
    ///
    /// Returns the first [`CoreError::InvalidConfig`] encountered.
    pub fn validate(&self) -> CoreResult<()> {
        for (name, config) in &self.connectors {
            config.validate(name)?;
        }
        Ok(())
    }
}
