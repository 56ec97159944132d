//! Offline cadence estimation via frequency analysis.
//!
//! The estimator runs over the persisted sample history: mean sampling rate
//! from timestamp deltas, acceleration magnitudes in arrival order, DFT, then
//! the dominant strictly-positive frequency bin converted to steps per minute.
//!
//! Unlike live ingestion, history is never coerced: a malformed field fails
//! the whole computation with [`CadenceError::InsufficientData`].

use crate::sample::SampleRecord;
use num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A persisted sample row, as the history store hands it back.
///
/// All fields are strings at this boundary; the persistence collaborator
/// guarantees nothing beyond "present", so the estimator parses defensively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSample {
    pub received_at_ms: String,
    pub client_timestamp_ms: String,
    pub acc_x: String,
    pub acc_y: String,
    pub acc_z: String,
    pub gyro_x: String,
    pub gyro_y: String,
    pub gyro_z: String,
}

impl StoredSample {
    /// The row form of a normalized sample.
    #[must_use]
    pub fn from_record(record: &SampleRecord) -> Self {
        Self {
            received_at_ms: record.received_at_ms.to_string(),
            client_timestamp_ms: record.client_timestamp_ms.to_string(),
            acc_x: record.acceleration.x.to_string(),
            acc_y: record.acceleration.y.to_string(),
            acc_z: record.acceleration.z.to_string(),
            gyro_x: record.angular_velocity.x.to_string(),
            gyro_y: record.angular_velocity.y.to_string(),
            gyro_z: record.angular_velocity.z.to_string(),
        }
    }
}

/// A cadence estimate over one history snapshot.
///
/// Computed fresh per request; never cached or persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CadenceReport {
    /// Steps-per-minute equivalent: `dominant_frequency_hz * 60`.
    pub cadence: f64,
    /// Frequency of the dominant positive bin, in Hz.
    pub dominant_frequency_hz: f64,
    /// Mean sampling rate derived from timestamp deltas, in Hz.
    pub sampling_frequency_hz: f64,
    /// Number of samples in the analyzed history.
    pub sample_count: usize,
}

/// Estimation failures. All are non-fatal; the caller maps them to a
/// client-visible "not enough data" response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CadenceError {
    /// The history cannot support a cadence estimate.
    #[error("not enough data: {reason}")]
    InsufficientData {
        /// What specifically disqualified the history.
        reason: &'static str,
    },
}

fn insufficient(reason: &'static str) -> CadenceError {
    CadenceError::InsufficientData { reason }
}

fn parse_finite(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Estimate cadence from an ordered history of persisted samples.
///
/// Pure function of its input: no hidden state, fully reproducible. Cost is
/// O(N log N) in the history length — fine for report-style use, not meant
/// to run per sample.
///
/// # Errors
///
/// Returns [`CadenceError::InsufficientData`] when the history is too short,
/// its timestamps are degenerate, or any acceleration component is
/// non-numeric.
pub fn estimate_cadence(history: &[StoredSample]) -> Result<CadenceReport, CadenceError> {
    if history.len() < 2 {
        return Err(insufficient("fewer than two samples"));
    }

    let timestamps: Vec<f64> = history
        .iter()
        .filter_map(|row| parse_finite(&row.received_at_ms))
        .collect();
    if timestamps.len() < 2 {
        return Err(insufficient("fewer than two parseable timestamps"));
    }

    let delta_sum: f64 = timestamps.windows(2).map(|pair| pair[1] - pair[0]).sum();
    let dt = delta_sum / 1000.0 / (timestamps.len() - 1) as f64;
    if !(dt > 0.0) {
        return Err(insufficient("degenerate sampling interval"));
    }
    let sampling_frequency_hz = 1.0 / dt;

    // Magnitude sequence in arrival order. Malformed history fails whole.
    let mut magnitudes = Vec::with_capacity(history.len());
    for row in history {
        let x = parse_finite(&row.acc_x);
        let y = parse_finite(&row.acc_y);
        let z = parse_finite(&row.acc_z);
        match (x, y, z) {
            (Some(x), Some(y), Some(z)) => magnitudes.push((x * x + y * y + z * z).sqrt()),
            _ => return Err(insufficient("non-numeric acceleration component")),
        }
    }

    let n = magnitudes.len();
    let mut spectrum: Vec<Complex64> = magnitudes
        .iter()
        .map(|&m| Complex64::new(m, 0.0))
        .collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut spectrum);

    // Strictly positive bins: k in 1..(n+1)/2. Bin 0 is DC; for even n the
    // k = n/2 bin is the negative Nyquist frequency by convention.
    let half = (n + 1) / 2;
    let mut dominant: Option<(usize, f64)> = None;
    for (k, value) in spectrum.iter().enumerate().take(half).skip(1) {
        let power = value.norm();
        // Strict comparison keeps the first (lowest-frequency) bin on ties.
        if dominant.map_or(true, |(_, best)| power > best) {
            dominant = Some((k, power));
        }
    }

    let Some((bin, _)) = dominant else {
        return Err(insufficient("no positive frequency bins"));
    };

    let dominant_frequency_hz = bin as f64 * sampling_frequency_hz / n as f64;
    Ok(CadenceReport {
        cadence: dominant_frequency_hz * 60.0,
        dominant_frequency_hz,
        sampling_frequency_hz,
        sample_count: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_protocol::Vector3;

    fn row(timestamp_ms: f64, magnitude: f64) -> StoredSample {
        StoredSample::from_record(&SampleRecord {
            received_at_ms: timestamp_ms as u64,
            client_timestamp_ms: timestamp_ms,
            acceleration: Vector3::new(magnitude, 0.0, 0.0),
            angular_velocity: Vector3::default(),
        })
    }

    /// A pure sinusoid of `f0` Hz riding on gravity, sampled at `fs` Hz.
    fn sinusoid_history(f0: f64, fs: f64, n: usize) -> Vec<StoredSample> {
        (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                let m = 9.81 + 2.0 * (2.0 * std::f64::consts::PI * f0 * t).sin();
                row(t * 1000.0, m)
            })
            .collect()
    }

    #[test]
    fn test_sinusoid_roundtrip_within_one_bin() {
        let (f0, fs, n) = (2.0, 50.0, 128);
        let report = estimate_cadence(&sinusoid_history(f0, fs, n)).unwrap();

        let bin_width = fs / n as f64;
        assert!(
            (report.dominant_frequency_hz - f0).abs() <= bin_width,
            "dominant {} not within {} of {}",
            report.dominant_frequency_hz,
            bin_width,
            f0
        );
        assert!((report.sampling_frequency_hz - fs).abs() < 1e-6);
        assert_eq!(report.sample_count, n);
        assert_eq!(report.cadence, report.dominant_frequency_hz * 60.0);
    }

    #[test]
    fn test_walking_pace_cadence() {
        // 1.8 Hz stride at 32 Hz sampling is roughly 108 steps per minute.
        let report = estimate_cadence(&sinusoid_history(1.8, 32.0, 256)).unwrap();
        assert!((report.cadence - 108.0).abs() <= 0.125 * 60.0);
    }

    #[test]
    fn test_single_record_is_insufficient() {
        let history = vec![row(0.0, 9.81)];
        assert_eq!(
            estimate_cadence(&history),
            Err(CadenceError::InsufficientData {
                reason: "fewer than two samples"
            })
        );
    }

    #[test]
    fn test_identical_timestamps_are_insufficient() {
        let history = vec![row(500.0, 9.81), row(500.0, 10.2)];
        assert_eq!(
            estimate_cadence(&history),
            Err(CadenceError::InsufficientData {
                reason: "degenerate sampling interval"
            })
        );
    }

    #[test]
    fn test_unparseable_timestamps_are_insufficient() {
        let mut history = vec![row(0.0, 9.81), row(20.0, 9.81), row(40.0, 9.81)];
        for r in &mut history {
            r.received_at_ms = "not-a-time".to_string();
        }
        assert_eq!(
            estimate_cadence(&history),
            Err(CadenceError::InsufficientData {
                reason: "fewer than two parseable timestamps"
            })
        );
    }

    #[test]
    fn test_malformed_acceleration_fails_whole_history() {
        let mut history = sinusoid_history(2.0, 50.0, 64);
        history[10].acc_y = "garbage".to_string();

        assert_eq!(
            estimate_cadence(&history),
            Err(CadenceError::InsufficientData {
                reason: "non-numeric acceleration component"
            })
        );
    }

    #[test]
    fn test_two_records_have_no_positive_bins() {
        // n = 2 leaves only the DC and Nyquist bins.
        let history = vec![row(0.0, 9.81), row(20.0, 10.2)];
        assert_eq!(
            estimate_cadence(&history),
            Err(CadenceError::InsufficientData {
                reason: "no positive frequency bins"
            })
        );
    }

    #[test]
    fn test_tie_break_picks_lowest_frequency() {
        // A zero signal leaves every positive bin tied at zero power; the
        // first bin must win deterministically.
        let history: Vec<StoredSample> = (0..8).map(|i| row(i as f64 * 100.0, 0.0)).collect();
        let report = estimate_cadence(&history).unwrap();
        assert!((report.dominant_frequency_hz - 10.0 / 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_reproducible_for_same_history() {
        let history = sinusoid_history(2.4, 40.0, 200);
        let first = estimate_cadence(&history).unwrap();
        let second = estimate_cadence(&history).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_stored_sample_roundtrip() {
        let record = SampleRecord {
            received_at_ms: 1_700_000_000_000,
            client_timestamp_ms: 1234.5,
            acceleration: Vector3::new(0.1, -0.2, 9.8),
            angular_velocity: Vector3::new(0.01, 0.02, 0.03),
        };
        let stored = StoredSample::from_record(&record);
        assert_eq!(stored.received_at_ms, "1700000000000");
        assert_eq!(stored.acc_z, "9.8");
        assert_eq!(stored.gyro_y, "0.02");
    }
}
