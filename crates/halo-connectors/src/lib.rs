//! Halo connectors - capability orchestration for a running agent session.
//!
//! This crate provides:
//! - A static connector registry (category, core flag, description)
//! - Readiness classification backed by credential hygiene checks
//! - Intent-based connector discovery
//! - Admission control (activation rate limit + capacity limit)
//! - The session activation manager behind the four agent-facing
//!   operations: `environment`, `discover`, `activate`, `deactivate`
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use halo_core::{EventBus, JsonConfigStore};
//! use halo_connectors::Orchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(JsonConfigStore::open("config.json")?);
//! let orchestrator = Orchestrator::new(store, EventBus::new());
//!
//! let report = orchestrator.environment().await?;
//! println!("{}", report.summary());
//!
//! for status in orchestrator.discover("deploy").await?.matches {
//!     println!("{}: {}", status.name, status.status);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod admission;
pub mod discover;
pub mod hygiene;
pub mod readiness;
pub mod registry;

mod error;
mod orchestrator;

pub use admission::{ActivationWindow, CapacityDecision, MAX_ACTIVE, RATE_MAX, RATE_WINDOW_SECS};
pub use discover::DiscoveryIndex;
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{
    ActivateOutcome, DeactivateOutcome, DiscoveryReport, EnvironmentReport, Orchestrator,
};
pub use readiness::{ConnectorStatus, Readiness};
pub use registry::{ConnectorCategory, ConnectorMeta};
