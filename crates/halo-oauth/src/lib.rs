//! Halo oauth - OAuth 2.1 PKCE credential broker for network-backed
//! connectors.
//!
//! This crate provides:
//! - Discovery of protected resource and authorization server metadata
//!   (RFC 9728, RFC 8414)
//! - Dynamic registration of a public client (RFC 7591)
//! - The PKCE authorization flow (RFC 7636) with an ephemeral,
//!   TTL-bounded flow-state store
//! - A local axum callback endpoint completing the flow
//! - Single-flight token refresh and a bulk "refresh everything expiring
//!   soon" sweep
//!
//! # Example
//!
//! ```rust,no_run
//! use std::future::IntoFuture;
//! use std::sync::Arc;
//! use halo_core::{EventBus, JsonConfigStore};
//! use halo_oauth::{callback, OAuthBroker};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(JsonConfigStore::open("config.json")?);
//! let broker = OAuthBroker::new(store, EventBus::new(), "http://localhost:43110/oauth/callback")?;
//! broker.spawn_sweeper();
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:43110").await?;
//! tokio::spawn(axum::serve(listener, callback::router(broker.clone())).into_future());
//!
//! let flow = broker.start_flow("linear").await?;
//! println!("Open {} in your browser", flow.authorization_url);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod callback;
pub mod flow;
pub mod metadata;
pub mod pkce;

mod broker;
mod error;

pub use broker::{
    OAuthBroker, RefreshOutcome, StartedFlow, AUTHORIZATION_SERVER_PATH, OAUTH_TIMEOUT_SECS,
    PROTECTED_RESOURCE_PATH, REFRESH_THRESHOLD_SECS,
};
pub use error::{OAuthError, OAuthResult};
pub use flow::{FlowState, FlowStore, FLOW_TTL_SECS, SWEEP_INTERVAL_SECS};
pub use pkce::{generate_pkce, generate_state, is_valid_state_shape, PkcePair};
