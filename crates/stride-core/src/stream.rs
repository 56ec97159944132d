//! Live stream fan-out.
//!
//! A single hub re-broadcasts every ingested sample to all connected
//! observers. Payloads are encoded once by the publisher and shared as
//! `Arc<StreamEvent>` across receivers; delivery back to the source
//! connection is filtered out at the receiving end.

use bytes::Bytes;
use dashmap::DashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default broadcast capacity.
const DEFAULT_HUB_CAPACITY: usize = 1024;

/// An event on the live stream.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// Originating connection, if any. Observers skip their own events.
    pub source: Option<String>,
    /// Pre-encoded frame bytes, shared zero-copy across all receivers.
    pub data: Bytes,
}

impl StreamEvent {
    /// Whether this event originated from the given connection.
    #[must_use]
    pub fn is_from(&self, connection_id: &str) -> bool {
        self.source.as_deref() == Some(connection_id)
    }
}

/// The re-broadcast hub.
pub struct StreamHub {
    sender: broadcast::Sender<Arc<StreamEvent>>,
    observers: DashSet<String>,
}

impl StreamHub {
    /// Create a hub with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HUB_CAPACITY)
    }

    /// Create a hub with a specific broadcast capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            observers: DashSet::new(),
        }
    }

    /// Attach an observer connection.
    ///
    /// Returns a receiver carrying every event published after this call.
    pub fn attach(&self, connection_id: impl Into<String>) -> broadcast::Receiver<Arc<StreamEvent>> {
        let connection_id = connection_id.into();
        self.observers.insert(connection_id.clone());
        debug!(connection = %connection_id, observers = self.observers.len(), "Observer attached");
        self.sender.subscribe()
    }

    /// Detach an observer connection.
    ///
    /// Returns `true` if the connection was attached.
    pub fn detach(&self, connection_id: &str) -> bool {
        let removed = self.observers.remove(connection_id).is_some();
        if removed {
            debug!(connection = %connection_id, observers = self.observers.len(), "Observer detached");
        }
        removed
    }

    /// Publish pre-encoded frame bytes to all observers.
    ///
    /// Returns the number of receivers the event reached.
    pub fn publish(&self, source: Option<&str>, data: Bytes) -> usize {
        let event = Arc::new(StreamEvent {
            source: source.map(Into::into),
            data,
        });
        trace!(source = ?event.source, "Publishing stream event");
        self.sender.send(event).unwrap_or_default()
    }

    /// Number of attached observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Whether no observers are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}
