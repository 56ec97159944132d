//! Motion sample normalization.
//!
//! Live ingestion never rejects a sample: whatever shape the device sends,
//! normalization coerces it into a fully-populated [`SampleRecord`]. This is
//! the only place coercion happens; the detector downstream is total over
//! valid records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use stride_protocol::{RawVector, Vector3};

/// Current wall-clock time in epoch milliseconds (UTC).
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// A validated, normalized motion sample.
///
/// Always fully populated: malformed numeric input is coerced during
/// [`SampleRecord::normalize`], never propagated as missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Server ingestion time in epoch milliseconds, immutable once assigned.
    pub received_at_ms: u64,
    /// Device timestamp in milliseconds; falls back to the server clock.
    pub client_timestamp_ms: f64,
    /// Acceleration in m/s².
    pub acceleration: Vector3,
    /// Angular velocity in rad/s. Carried for persistence and broadcast,
    /// not consumed by the detection algorithms.
    pub angular_velocity: Vector3,
}

impl SampleRecord {
    /// Normalize raw device readings into a valid record.
    ///
    /// `received_at_ms` is the ingestion timestamp assigned by the caller and
    /// doubles as the fallback for an unusable device timestamp.
    #[must_use]
    pub fn normalize(
        timestamp: Option<&Value>,
        accelerometer: &RawVector,
        gyroscope: &RawVector,
        received_at_ms: u64,
    ) -> Self {
        Self {
            received_at_ms,
            client_timestamp_ms: coerce_timestamp_ms(timestamp, received_at_ms),
            acceleration: coerce_vector(accelerometer),
            angular_velocity: coerce_vector(gyroscope),
        }
    }
}

/// Best-effort float coercion: numbers and numeric strings parse, everything
/// else (missing, null, objects, booleans) becomes 0.0.
fn coerce_component(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Coerce a raw 3-axis reading into a normalized vector.
#[must_use]
pub fn coerce_vector(raw: &RawVector) -> Vector3 {
    Vector3::new(
        coerce_component(raw.x.as_ref()),
        coerce_component(raw.y.as_ref()),
        coerce_component(raw.z.as_ref()),
    )
}

/// Coerce a device timestamp; unusable input falls back to the server clock.
#[must_use]
pub fn coerce_timestamp_ms(value: Option<&Value>, fallback_ms: u64) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(fallback_ms as f64),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(fallback_ms as f64),
        _ => fallback_ms as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_numeric_input() {
        let record = SampleRecord::normalize(
            Some(&json!(1234.5)),
            &RawVector::from_floats(0.1, -0.2, 9.8),
            &RawVector::from_floats(0.01, 0.02, 0.03),
            1_700_000_000_000,
        );

        assert_eq!(record.received_at_ms, 1_700_000_000_000);
        assert_eq!(record.client_timestamp_ms, 1234.5);
        assert_eq!(record.acceleration, Vector3::new(0.1, -0.2, 9.8));
        assert_eq!(record.angular_velocity, Vector3::new(0.01, 0.02, 0.03));
    }

    #[test]
    fn test_normalize_numeric_strings() {
        let raw = RawVector {
            x: Some(json!("3.5")),
            y: Some(json!(" -1.25 ")),
            z: Some(json!("9.81")),
        };
        let v = coerce_vector(&raw);
        assert_eq!(v, Vector3::new(3.5, -1.25, 9.81));
    }

    #[test]
    fn test_normalize_coerces_garbage_to_zero() {
        let raw = RawVector {
            x: Some(json!("abc")),
            y: Some(json!(null)),
            z: None,
        };
        assert_eq!(coerce_vector(&raw), Vector3::default());

        let record = SampleRecord::normalize(
            Some(&json!({"weird": true})),
            &raw,
            &RawVector::default(),
            42_000,
        );
        // Unusable timestamp falls back to the server clock.
        assert_eq!(record.client_timestamp_ms, 42_000.0);
        assert_eq!(record.acceleration, Vector3::default());
    }

    #[test]
    fn test_timestamp_string_parses() {
        assert_eq!(coerce_timestamp_ms(Some(&json!("1500.0")), 0), 1500.0);
        assert_eq!(coerce_timestamp_ms(None, 777), 777.0);
    }
}
