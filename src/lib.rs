//! Tello Tracker
//!
//! Closed-loop visual tracking for a Tello quadcopter: keep one detected
//! subject centered in frame and at the apparent distance captured when it
//! was first seen clearly.
//!
//! # Architecture
//!
//! Two loops run side by side and never wait on each other:
//!
//! 1. **Tracking loop**: decoded frame → detector → controller → motion
//!    commands. Per-frame buffers live for one iteration.
//! 2. **Lifecycle handler**: a single consumer of device events (connect,
//!    telemetry, video packets, link loss) and timers (scheduled landing,
//!    video keep-alive). Owns takeoff and landing.
//!
//! # Module Structure
//!
//! - `frame`: decoded frame container and the `FrameSource` contract
//! - `ingest`: ffmpeg decoder process, pipe frame source, video relay
//! - `detect`: detector backends and detection filtering
//! - `tracking`: calibrator, controller and the tracking loop
//! - `device`: motion commands, dispatchers, the UDP link, telemetry
//! - `lifecycle`: events, scheduler and the event router
//! - `session`: owns every process-wide resource; single shutdown path
//! - `config`: file + environment configuration

pub mod config;
pub mod detect;
pub mod device;
pub mod frame;
pub mod ingest;
pub mod lifecycle;
pub mod session;
pub mod tracking;

pub use config::{DecoderSettings, LinkSettings, TrackerConfig};
pub use detect::{load_backend, Detection, DetectionResult, DetectorBackend, RawDetection};
pub use device::{
    CommandDispatcher, MotionCommand, RecordingDispatcher, StreamRequest, Telemetry,
    TelemetrySnapshot, TelloLink,
};
pub use frame::{Frame, FrameReadError, FrameSource};
pub use ingest::{FfmpegDecoder, PipeFrameSource};
pub use lifecycle::{EventRouter, LifecycleEvent, TimerKind};
pub use session::Session;
pub use tracking::{
    BoundingBox, CalibrationOutcome, Calibrator, FrameDecision, FrameGeometry, TrackingController,
    TrackingLoop, TrackingState,
};
