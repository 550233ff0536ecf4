//! Event publication seam.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::error::TradingError;
use crate::events::Event;

/// Handle returned by [`EventPublisher::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    #[error("listener rejected event: {0}")]
    Rejected(String),

    #[error("listener disconnected: {0}")]
    Disconnected(String),
}

/// Consumer of published events.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &Event) -> Result<(), ListenerError>;

    /// Deliver a batch; stops at the first failing event.
    fn on_batch(&self, events: &[Event]) -> Result<(), ListenerError> {
        for event in events {
            self.on_event(event)?;
        }
        Ok(())
    }
}

/// Fan-out of run events to listeners.
///
/// `publish` never blocks the caller and never fails; delivery problems are
/// logged by the implementation.
pub trait EventPublisher: Send + Sync {
    fn add_listener(&self, listener: Arc<dyn EventListener>) -> ListenerId;

    /// Returns whether a listener was removed.
    fn remove_listener(&self, id: ListenerId) -> bool;

    fn publish(&self, event: Event);

    fn publish_error(&self, strategy_id: &str, error: &TradingError, timestamp: DateTime<Utc>) {
        self.publish(Event::error(strategy_id, error, timestamp));
    }

    /// Stop accepting events. Later publishes are dropped silently.
    fn shutdown(&self);
}
