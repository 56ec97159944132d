//! # stride-core
//!
//! Core motion-stream logic for Stridewatch.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **SampleRecord** - Validated, normalized motion samples
//! - **FallDetector** - Per-connection freefall/impact state machine
//! - **FallStateStore** - Detector state keyed by connection identity
//! - **CadenceEstimator** - Spectral cadence estimation over history
//! - **StreamHub** - Re-broadcast fan-out to stream observers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ SensorUpdate│────▶│  normalize  │────▶│FallStateStore│──▶ FallEvent
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │  StreamHub  │     │   history   │──▶ CadenceReport
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! Everything here is synchronous and pure over its inputs; transport,
//! persistence, and notification delivery live in the server crate.

pub mod cadence;
pub mod fall;
pub mod sample;
pub mod store;
pub mod stream;

pub use cadence::{estimate_cadence, CadenceError, CadenceReport, StoredSample};
pub use fall::{ConnectionFallState, FallConfig, FallDetector, FallEvent};
pub use sample::SampleRecord;
pub use store::FallStateStore;
pub use stream::{StreamEvent, StreamHub};
