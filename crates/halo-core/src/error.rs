//! Core error types.

use thiserror::Error;

/// Errors from the core data model and configuration store.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Connector not present in the configuration.
    #[error("connector not found: {name}")]
    ConnectorNotFound {
        /// The connector name that was not found.
        name: String,
    },

    /// Connector entry has an invalid shape.
    #[error("invalid connector config for {name}: {reason}")]
    InvalidConfig {
        /// The connector name.
        name: String,
        /// Why the entry was rejected.
        reason: String,
    },

    /// Live session rejected the connector set wholesale.
    #[error("session apply failed: {0}")]
    SessionApply(String),

    /// IO error reading or writing the configuration file.
    #[error("config file error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
