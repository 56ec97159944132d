//! Freefall/impact detection over the live motion stream.
//!
//! The detector is a two-state machine per connection: `Grounded` until the
//! acceleration magnitude drops below the freefall threshold, then
//! `Freefalling` until either an impact lands inside the time window (one
//! [`FallEvent`] is emitted) or the window expires silently. Dropping below
//! the freefall threshold while already freefalling refreshes the episode's
//! start time, so a new freefall begins where the old one ended.

use crate::sample::SampleRecord;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Detection thresholds.
///
/// Two threshold pairs are in deployment; neither is hard-coded as the only
/// choice. Callers pick [`FallConfig::strict`], [`FallConfig::sensitive`],
/// or supply explicit values. There is deliberately no `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallConfig {
    /// Magnitude below which a sample counts as freefall, in m/s².
    pub freefall_threshold: f64,
    /// Magnitude above which a sample counts as impact, in m/s².
    pub impact_threshold: f64,
    /// Maximum freefall-to-impact gap for a fall, in milliseconds.
    pub window_ms: f64,
}

impl FallConfig {
    /// The stricter deployed pair: freefall below 2.0 m/s², impact above
    /// 30.0 m/s², within 1000 ms.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            freefall_threshold: 2.0,
            impact_threshold: 30.0,
            window_ms: 1000.0,
        }
    }

    /// The looser deployed pair: freefall below 5.0 m/s², impact above
    /// 15.0 m/s², within 1000 ms.
    #[must_use]
    pub const fn sensitive() -> Self {
        Self {
            freefall_threshold: 5.0,
            impact_threshold: 15.0,
            window_ms: 1000.0,
        }
    }
}

/// Per-connection detector state.
///
/// Created when a connection is established, discarded when it ends. Never
/// shared across connections, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConnectionFallState {
    /// Whether the connection is currently in a freefall episode.
    pub in_freefall: bool,
    /// Start of the most recent freefall episode, in milliseconds.
    pub freefall_timestamp_ms: f64,
}

/// A detected fall. Produced at most once per freefall episode; delivery is
/// the coordinator's concern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FallEvent {
    /// Server time of detection in epoch milliseconds.
    pub detected_at_ms: u64,
    /// Acceleration magnitude at the detecting sample, in m/s².
    pub impact_acceleration: f64,
}

/// The fall detection state machine.
///
/// Pure over its inputs: the only effects are the mutated state and the
/// optional event. No I/O.
#[derive(Debug, Clone, Copy)]
pub struct FallDetector {
    config: FallConfig,
}

impl FallDetector {
    /// Create a detector with the given thresholds.
    #[must_use]
    pub const fn new(config: FallConfig) -> Self {
        Self { config }
    }

    /// The configured thresholds.
    #[must_use]
    pub const fn config(&self) -> &FallConfig {
        &self.config
    }

    /// Apply one sample to a connection's state.
    ///
    /// Same-connection samples must be applied in arrival order; the window
    /// arithmetic is not commutative.
    pub fn process(
        &self,
        state: &mut ConnectionFallState,
        sample: &SampleRecord,
    ) -> Option<FallEvent> {
        let magnitude = sample.acceleration.magnitude();
        let timestamp_ms = sample.client_timestamp_ms;
        let mut event = None;

        if state.in_freefall {
            let elapsed = timestamp_ms - state.freefall_timestamp_ms;

            if magnitude > self.config.impact_threshold && elapsed < self.config.window_ms {
                event = Some(FallEvent {
                    detected_at_ms: sample.received_at_ms,
                    impact_acceleration: magnitude,
                });
                state.in_freefall = false;
            } else if elapsed >= self.config.window_ms {
                // Episode expired without impact; no event.
                trace!(elapsed_ms = elapsed, "freefall window expired");
                state.in_freefall = false;
            }
        }

        // Re-arms even in the same call that emitted an event: a new freefall
        // begins where the old one ended.
        if magnitude < self.config.freefall_threshold {
            state.in_freefall = true;
            state.freefall_timestamp_ms = timestamp_ms;
        }

        event
    }
}
