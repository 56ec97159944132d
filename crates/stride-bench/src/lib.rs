//! Shared synthetic-data generators for the Stridewatch benchmarks.

use stride_core::{SampleRecord, StoredSample};
use stride_protocol::Vector3;

/// A live sample at `timestamp_ms` with the given acceleration.
#[must_use]
pub fn live_sample(timestamp_ms: f64, ax: f64, ay: f64, az: f64) -> SampleRecord {
    SampleRecord {
        received_at_ms: timestamp_ms as u64,
        client_timestamp_ms: timestamp_ms,
        acceleration: Vector3::new(ax, ay, az),
        angular_velocity: Vector3::default(),
    }
}

/// A steady stream of grounded samples at 50 Hz — the detector's hot path.
#[must_use]
pub fn grounded_stream(n: usize) -> Vec<SampleRecord> {
    (0..n)
        .map(|i| live_sample(i as f64 * 20.0, 0.1, -0.2, 9.81))
        .collect()
}

/// A stream that cycles freefall, impact, and recovery every four samples,
/// exercising every transition of the detector's state machine.
#[must_use]
pub fn fall_cycle_stream(n: usize) -> Vec<SampleRecord> {
    (0..n)
        .map(|i| {
            let t = i as f64 * 100.0;
            match i % 4 {
                0 => live_sample(t, 0.0, 0.0, 9.81),
                1 => live_sample(t, 0.0, 0.0, 0.5),
                2 => live_sample(t, 25.0, 15.0, 12.0),
                _ => live_sample(t, 0.3, 0.1, 9.7),
            }
        })
        .collect()
}

/// A walking-pace history: sinusoidal magnitude at `f0` Hz sampled at `fs` Hz,
/// in the string row form the estimator consumes.
#[must_use]
pub fn walk_history(f0: f64, fs: f64, n: usize) -> Vec<StoredSample> {
    (0..n)
        .map(|i| {
            let t = i as f64 / fs;
            let m = 9.81 + 2.0 * (2.0 * std::f64::consts::PI * f0 * t).sin();
            StoredSample::from_record(&live_sample(t * 1000.0, m, 0.0, 0.0))
        })
        .collect()
}
