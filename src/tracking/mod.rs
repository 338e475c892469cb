//! Calibration and per-frame control.
//!
//! - `geometry`: frame/box geometry and the distance tolerance
//! - `calibrator`: one-shot baseline latch
//! - `controller`: detection → yaw/vertical/pitch commands and the
//!   Uncalibrated/Tracking/Lost state machine
//! - `pipeline`: the blocking frame → detect → control → dispatch loop

mod calibrator;
mod controller;
mod geometry;
pub mod pipeline;

pub use calibrator::{CalibrationOutcome, CalibrationState, Calibrator, BASELINE_MIN_TOLERANCES};
pub use controller::{
    FrameDecision, TrackingController, TrackingSession, TrackingState, DEPTH_SPEED,
    VERTICAL_SPEED, WAKE_GESTURE_SPEED, YAW_LEFT_SPEED, YAW_RIGHT_SPEED,
};
pub use geometry::{BoundingBox, FrameGeometry, TOLERANCE_FRACTION};
pub use pipeline::{FrameStep, LoopStats, TrackingLoop};
