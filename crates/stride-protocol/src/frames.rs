//! Frame types for the Stridewatch protocol.
//!
//! Inbound sensor frames are deliberately tolerant: every reading arrives as a
//! raw `serde_json::Value` and is coerced during normalization, never rejected.
//! Outbound frames carry only fully normalized numeric fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frame type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum FrameType {
    Connect = 0x01,
    Connected = 0x02,
    SensorUpdate = 0x03,
    SensorBroadcast = 0x04,
    FallAlert = 0x05,
    Ack = 0x06,
    Error = 0x07,
    Ping = 0x08,
    Pong = 0x09,
}

impl From<FrameType> for u8 {
    fn from(ft: FrameType) -> u8 {
        ft as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        match value {
            0x01 => Ok(FrameType::Connect),
            0x02 => Ok(FrameType::Connected),
            0x03 => Ok(FrameType::SensorUpdate),
            0x04 => Ok(FrameType::SensorBroadcast),
            0x05 => Ok(FrameType::FallAlert),
            0x06 => Ok(FrameType::Ack),
            0x07 => Ok(FrameType::Error),
            0x08 => Ok(FrameType::Ping),
            0x09 => Ok(FrameType::Pong),
            _ => Err("Invalid frame type"),
        }
    }
}

/// A 3-axis reading as received from a device.
///
/// Components may be absent, numbers, numeric strings, or garbage; the
/// normalization step coerces each to a float.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVector {
    /// X-axis reading, if supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<Value>,
    /// Y-axis reading, if supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<Value>,
    /// Z-axis reading, if supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<Value>,
}

impl RawVector {
    /// Create a raw vector from already-numeric components.
    #[must_use]
    pub fn from_floats(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Value::from(x).into(),
            y: Value::from(y).into(),
            z: Value::from(z).into(),
        }
    }
}

/// A normalized 3-axis vector in SI units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    /// Create a new vector.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm. No clamping or saturation.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// A protocol frame.
///
/// Frames are the messages exchanged between clients and the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Initial connection handshake.
    #[serde(rename = "connect")]
    Connect {
        /// Protocol version.
        version: u8,
        /// Optional authentication token.
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Connection established response.
    #[serde(rename = "connected")]
    Connected {
        /// Server-assigned connection identifier.
        connection_id: String,
        /// Negotiated protocol version.
        version: u8,
        /// Recommended heartbeat interval in milliseconds.
        heartbeat: u32,
    },

    /// A raw motion sample pushed by a device.
    #[serde(rename = "sensor_update")]
    SensorUpdate {
        /// Optional request ID for acknowledgment.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        /// Device timestamp in milliseconds; any shape is accepted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<Value>,
        /// Raw accelerometer reading.
        #[serde(default)]
        accelerometer: RawVector,
        /// Raw gyroscope reading.
        #[serde(default)]
        gyroscope: RawVector,
    },

    /// A normalized sample re-broadcast to stream observers.
    #[serde(rename = "sensor_broadcast")]
    SensorBroadcast {
        /// Originating connection, if the sample came over the stream.
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        /// Server ingestion time in epoch milliseconds.
        received_at_ms: u64,
        /// Coerced device timestamp in milliseconds.
        client_timestamp_ms: f64,
        /// Normalized acceleration in m/s².
        acceleration: Vector3,
        /// Normalized angular velocity in rad/s.
        angular_velocity: Vector3,
    },

    /// Fall detected on this connection's stream.
    #[serde(rename = "fall_alert")]
    FallAlert {
        /// Server time of detection in epoch milliseconds.
        detected_at_ms: u64,
        /// Acceleration magnitude at the detecting sample.
        impact_acceleration: f64,
    },

    /// Acknowledgment of a request.
    #[serde(rename = "ack")]
    Ack {
        /// ID of the acknowledged request.
        id: u64,
    },

    /// Error response.
    #[serde(rename = "error")]
    Error {
        /// ID of the failed request (0 if not applicable).
        id: u64,
        /// Error code.
        code: u16,
        /// Human-readable error message.
        message: String,
    },

    /// Keepalive ping.
    #[serde(rename = "ping")]
    Ping {
        /// Optional timestamp.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Keepalive pong.
    #[serde(rename = "pong")]
    Pong {
        /// Echoed timestamp from ping.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },
}

impl Frame {
    /// Get the frame type.
    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Connect { .. } => FrameType::Connect,
            Frame::Connected { .. } => FrameType::Connected,
            Frame::SensorUpdate { .. } => FrameType::SensorUpdate,
            Frame::SensorBroadcast { .. } => FrameType::SensorBroadcast,
            Frame::FallAlert { .. } => FrameType::FallAlert,
            Frame::Ack { .. } => FrameType::Ack,
            Frame::Error { .. } => FrameType::Error,
            Frame::Ping { .. } => FrameType::Ping,
            Frame::Pong { .. } => FrameType::Pong,
        }
    }

    /// Create a new Connect frame.
    #[must_use]
    pub fn connect(version: u8, token: Option<String>) -> Self {
        Frame::Connect { version, token }
    }

    /// Create a new Connected frame.
    #[must_use]
    pub fn connected(connection_id: impl Into<String>, version: u8, heartbeat: u32) -> Self {
        Frame::Connected {
            connection_id: connection_id.into(),
            version,
            heartbeat,
        }
    }

    /// Create a SensorUpdate frame from raw readings.
    #[must_use]
    pub fn sensor_update(timestamp: Option<Value>, accelerometer: RawVector, gyroscope: RawVector) -> Self {
        Frame::SensorUpdate {
            id: None,
            timestamp,
            accelerometer,
            gyroscope,
        }
    }

    /// Create a SensorUpdate frame with ID for acknowledgment.
    #[must_use]
    pub fn sensor_update_with_ack(
        id: u64,
        timestamp: Option<Value>,
        accelerometer: RawVector,
        gyroscope: RawVector,
    ) -> Self {
        Frame::SensorUpdate {
            id: Some(id),
            timestamp,
            accelerometer,
            gyroscope,
        }
    }

    /// Create a SensorBroadcast frame for a normalized sample.
    #[must_use]
    pub fn sensor_broadcast(
        source: Option<String>,
        received_at_ms: u64,
        client_timestamp_ms: f64,
        acceleration: Vector3,
        angular_velocity: Vector3,
    ) -> Self {
        Frame::SensorBroadcast {
            source,
            received_at_ms,
            client_timestamp_ms,
            acceleration,
            angular_velocity,
        }
    }

    /// Create a FallAlert frame.
    #[must_use]
    pub fn fall_alert(detected_at_ms: u64, impact_acceleration: f64) -> Self {
        Frame::FallAlert {
            detected_at_ms,
            impact_acceleration,
        }
    }

    /// Create a new Ack frame.
    #[must_use]
    pub fn ack(id: u64) -> Self {
        Frame::Ack { id }
    }

    /// Create a new Error frame.
    #[must_use]
    pub fn error(id: u64, code: u16, message: impl Into<String>) -> Self {
        Frame::Error {
            id,
            code,
            message: message.into(),
        }
    }

    /// Create a new Ping frame.
    #[must_use]
    pub fn ping() -> Self {
        Frame::Ping { timestamp: None }
    }

    /// Create a new Pong frame.
    #[must_use]
    pub fn pong(timestamp: Option<u64>) -> Self {
        Frame::Pong { timestamp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_type() {
        let update = Frame::sensor_update(None, RawVector::default(), RawVector::default());
        assert_eq!(update.frame_type(), FrameType::SensorUpdate);

        let alert = Frame::fall_alert(1_700_000_000_000, 34.6);
        assert_eq!(alert.frame_type(), FrameType::FallAlert);
    }

    #[test]
    fn test_frame_type_conversion() {
        assert_eq!(FrameType::try_from(0x03), Ok(FrameType::SensorUpdate));
        assert_eq!(FrameType::try_from(0x05), Ok(FrameType::FallAlert));
        assert!(FrameType::try_from(0x0A).is_err());
    }

    #[test]
    fn test_sensor_update_tolerates_garbage() {
        // Fields of any shape must survive a serde round-trip untouched.
        let frame = Frame::sensor_update(
            Some(json!("not-a-number")),
            RawVector {
                x: Some(json!(9.81)),
                y: Some(json!("2.5")),
                z: Some(json!({"nested": true})),
            },
            RawVector::default(),
        );

        let encoded = serde_json::to_string(&frame).unwrap();
        let decoded: Frame = serde_json::from_str(&encoded).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn test_vector3_magnitude() {
        let v = Vector3::new(3.0, 4.0, 0.0);
        assert_eq!(v.magnitude(), 5.0);
        assert_eq!(Vector3::default().magnitude(), 0.0);
    }
}
