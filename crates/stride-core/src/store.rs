//! Per-connection detector state, keyed by connection identity.

use crate::fall::{ConnectionFallState, FallConfig, FallDetector, FallEvent};
use crate::sample::SampleRecord;
use dashmap::DashMap;
use tracing::debug;

/// Detector state for all live connections.
///
/// State is created on connect and destroyed on disconnect; samples for an
/// untracked connection are a no-op, not an error. The per-key exclusive
/// guard serializes same-connection samples while leaving different
/// connections fully parallel.
pub struct FallStateStore {
    detector: FallDetector,
    states: DashMap<String, ConnectionFallState>,
}

impl FallStateStore {
    /// Create a store running the detector with the given thresholds.
    #[must_use]
    pub fn new(config: FallConfig) -> Self {
        Self {
            detector: FallDetector::new(config),
            states: DashMap::new(),
        }
    }

    /// The detector's thresholds.
    #[must_use]
    pub const fn config(&self) -> &FallConfig {
        self.detector.config()
    }

    /// Start tracking a connection with fresh state.
    pub fn track(&self, connection_id: impl Into<String>) {
        let connection_id = connection_id.into();
        debug!(connection = %connection_id, "Tracking fall state");
        self.states
            .insert(connection_id, ConnectionFallState::default());
    }

    /// Stop tracking a connection, discarding its state.
    ///
    /// Returns `true` if the connection was tracked.
    pub fn release(&self, connection_id: &str) -> bool {
        let removed = self.states.remove(connection_id).is_some();
        if removed {
            debug!(connection = %connection_id, "Released fall state");
        }
        removed
    }

    /// Run the detector for one sample on the given connection.
    ///
    /// Returns the fall event if one fired, or `None` — including for
    /// connections that are not tracked, where detection simply does not run.
    pub fn apply(&self, connection_id: &str, sample: &SampleRecord) -> Option<FallEvent> {
        let mut entry = self.states.get_mut(connection_id)?;
        self.detector.process(entry.value_mut(), sample)
    }

    /// Whether a connection is currently tracked.
    #[must_use]
    pub fn is_tracked(&self, connection_id: &str) -> bool {
        self.states.contains_key(connection_id)
    }

    /// Number of tracked connections.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.states.len()
    }
}
