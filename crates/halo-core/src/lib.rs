//! Halo core - shared connector data model and integration seams.
//!
//! This crate provides:
//! - The persisted connector configuration model (tagged transport union,
//!   OAuth credentials, verbatim preservation of unknown fields)
//! - The [`ConfigStore`] seam over the persisted configuration file
//! - The [`SessionHandle`] seam used to push connector sets into a live
//!   agent session
//! - The [`EventBus`] used to notify observers of connector status changes
//!
//! # Architecture
//!
//! The orchestrator (`halo-connectors`) and the credential broker
//! (`halo-oauth`) both receive a `ConfigStore` and an `EventBus` by
//! constructor injection. Nothing in this workspace reaches for process-wide
//! singletons; the session and the configuration file are the only shared
//! state, and both sit behind the seams defined here.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod config;
mod credential;
mod error;
mod events;
mod session;
mod store;

pub use config::{ConnectorConfig, ConnectorsFile, LaunchSpec, Transport};
pub use credential::OAuthCredential;
pub use error::{CoreError, CoreResult};
pub use events::{ConnectorEvent, EventBus, EventReceiver, DEFAULT_CHANNEL_CAPACITY};
pub use session::{ApplyReport, SessionHandle};
pub use store::{ConfigStore, JsonConfigStore};
