//! Event bus for broadcasting connector status changes to observers.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Connector lifecycle events pushed to observers (UI, agent, logs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorEvent {
    /// An OAuth authorization flow finished (successfully or not).
    AuthorizationCompleted {
        /// Connector the flow belonged to.
        connector: String,
        /// Whether a credential was obtained.
        success: bool,
        /// Failure detail, when `success` is false.
        error: Option<String>,
    },
    /// Stored credentials were invalidated; these connectors need the user
    /// to authorize again.
    ReauthorizationRequired {
        /// Affected connector names.
        connectors: Vec<String>,
    },
    /// A connector was dynamically activated into the session.
    Activated {
        /// Connector name.
        connector: String,
    },
    /// A connector was dynamically deactivated from the session.
    Deactivated {
        /// Connector name.
        connector: String,
    },
}

impl ConnectorEvent {
    /// Short event name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthorizationCompleted { .. } => "authorization-completed",
            Self::ReauthorizationRequired { .. } => "reauthorization-required",
            Self::Activated { .. } => "activated",
            Self::Deactivated { .. } => "deactivated",
        }
    }
}

/// Receiver half of the event bus.
pub type EventReceiver = broadcast::Receiver<Arc<ConnectorEvent>>;

/// Broadcast bus delivering [`ConnectorEvent`]s to all subscribers.
///
/// Events are delivered asynchronously and in order. Publishing with no
/// subscribers is not an error; the event is simply dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<ConnectorEvent>>,
}

impl EventBus {
    /// Create a bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with the given channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers that got the event.
    pub fn publish(&self, event: ConnectorEvent) -> usize {
        let event = Arc::new(event);
        match self.sender.send(Arc::clone(&event)) {
            Ok(count) => {
                debug!(kind = event.kind(), receivers = count, "Event published");
                count
            }
            Err(_) => {
                trace!(kind = event.kind(), "No receivers for event");
                0
            }
        }
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
