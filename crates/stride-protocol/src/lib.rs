//! # stride-protocol
//!
//! Wire protocol for the Stridewatch motion stream.
//!
//! Clients push raw accelerometer/gyroscope readings as [`Frame::SensorUpdate`]
//! frames; the server answers with normalized [`Frame::SensorBroadcast`] fan-out
//! and, when the fall detector fires, a [`Frame::FallAlert`] back to the source
//! connection.
//!
//! Frames are MessagePack-encoded with a 4-byte big-endian length prefix so a
//! single WebSocket binary message can carry any number of complete frames.

pub mod codec;
pub mod frames;
pub mod version;

pub use codec::ProtocolError;
pub use frames::{Frame, FrameType, RawVector, Vector3};
pub use version::{Version, PROTOCOL_VERSION};
