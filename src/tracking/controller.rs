use crate::detect::Detection;
use crate::device::{Axis, MotionCommand};

use super::calibrator::{CalibrationOutcome, Calibrator};
use super::geometry::FrameGeometry;

/// Counter-rotation speed when the subject sits left of center.
pub const YAW_LEFT_SPEED: u8 = 15;
/// Rotation speed when the subject sits right of center.
pub const YAW_RIGHT_SPEED: u8 = 30;
pub const VERTICAL_SPEED: u8 = 30;
pub const DEPTH_SPEED: u8 = 30;
/// Magnitude of the ascend/descend pair issued on a rejected baseline.
pub const WAKE_GESTURE_SPEED: u8 = 50;
/// The depth dead-band is the distance tolerance divided by this.
pub const DEPTH_BAND_DIVISOR: f64 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingState {
    Uncalibrated,
    Tracking,
    Lost,
}

/// Per-run tracking state owned by the controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackingSession {
    pub state: TrackingState,
    pub reference_distance: f64,
    pub lost_frames: u32,
}

impl Default for TrackingSession {
    fn default() -> Self {
        Self {
            state: TrackingState::Uncalibrated,
            reference_distance: 0.0,
            lost_frames: 0,
        }
    }
}

/// What the controller decided for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameDecision {
    pub commands: Vec<MotionCommand>,
    pub state: TrackingState,
    pub calibration: Option<CalibrationOutcome>,
    pub reference_distance: Option<f64>,
}

impl FrameDecision {
    /// The command issued on `axis`, if any.
    pub fn command_for(&self, axis: Axis) -> Option<MotionCommand> {
        self.commands.iter().copied().find(|c| c.axis() == Some(axis))
    }
}

/// Turns the current detection (or its absence) into motion commands.
pub struct TrackingController {
    geometry: FrameGeometry,
    tolerance: f64,
    calibrator: Calibrator,
    session: TrackingSession,
    rebaseline_after: Option<u32>,
}

impl TrackingController {
    pub fn new(geometry: FrameGeometry) -> Self {
        let tolerance = geometry.distance_tolerance();
        Self {
            geometry,
            tolerance,
            calibrator: Calibrator::new(tolerance),
            session: TrackingSession::default(),
            rebaseline_after: None,
        }
    }

    /// Forget the baseline after this many consecutive lost frames.
    pub fn with_rebaseline_after(mut self, lost_frames: Option<u32>) -> Self {
        self.rebaseline_after = lost_frames.filter(|n| *n > 0);
        self
    }

    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Run once per frame with the frame's first accepted detection.
    pub fn step(&mut self, detection: Option<&Detection>) -> FrameDecision {
        match detection.filter(|d| d.is_accepted()) {
            None => self.on_missing(),
            Some(detection) => self.on_detection(detection),
        }
    }

    fn on_missing(&mut self) -> FrameDecision {
        self.session.lost_frames = self.session.lost_frames.saturating_add(1);
        if self.session.state != TrackingState::Uncalibrated {
            self.session.state = TrackingState::Lost;
        }
        if let Some(limit) = self.rebaseline_after {
            if self.calibrator.is_established() && self.session.lost_frames >= limit {
                log::info!(
                    "subject lost for {} frames; discarding baseline",
                    self.session.lost_frames
                );
                self.calibrator.reset();
                self.session.state = TrackingState::Uncalibrated;
            }
        }
        FrameDecision {
            commands: neutral_commands(),
            state: self.session.state,
            calibration: None,
            reference_distance: None,
        }
    }

    fn on_detection(&mut self, detection: &Detection) -> FrameDecision {
        self.session.lost_frames = 0;
        let bbox = &detection.bbox;

        let mut calibration = None;
        if !self.calibrator.is_established() {
            let outcome = self.calibrator.consider(bbox);
            calibration = Some(outcome);
            if let CalibrationOutcome::Rejected { distance, minimum } = outcome {
                log::info!(
                    "subject too far away for a baseline ({:.1} < {:.1}); waking",
                    distance,
                    minimum
                );
                return FrameDecision {
                    commands: vec![
                        MotionCommand::Ascend(WAKE_GESTURE_SPEED),
                        MotionCommand::Descend(WAKE_GESTURE_SPEED),
                    ],
                    state: TrackingState::Uncalibrated,
                    calibration,
                    reference_distance: None,
                };
            }
            log::info!("baseline distance set to {:.1}", bbox.diagonal());
        }

        let resumed = self.session.state != TrackingState::Tracking;
        self.session.reference_distance = bbox.diagonal();

        let w = self.geometry.width as f32;
        let h = self.geometry.height as f32;

        let yaw = if bbox.right < w / 2.0 {
            MotionCommand::CounterRotate(YAW_LEFT_SPEED)
        } else if bbox.left > w / 2.0 {
            MotionCommand::Rotate(YAW_RIGHT_SPEED)
        } else {
            MotionCommand::neutral(Axis::Yaw)
        };

        let vertical = if bbox.top < h / 10.0 {
            MotionCommand::Ascend(VERTICAL_SPEED)
        } else if bbox.bottom > h - h / 10.0 {
            MotionCommand::Descend(VERTICAL_SPEED)
        } else {
            MotionCommand::neutral(Axis::Vertical)
        };

        let pitch = if resumed {
            MotionCommand::neutral(Axis::Pitch)
        } else {
            self.depth_command()
        };

        self.session.state = TrackingState::Tracking;
        FrameDecision {
            commands: vec![yaw, vertical, pitch],
            state: TrackingState::Tracking,
            calibration,
            reference_distance: Some(self.session.reference_distance),
        }
    }

    fn depth_command(&self) -> MotionCommand {
        let Some(baseline) = self.calibrator.baseline_distance() else {
            return MotionCommand::neutral(Axis::Pitch);
        };
        let band = self.tolerance / DEPTH_BAND_DIVISOR;
        let reference = self.session.reference_distance;
        if reference < baseline - band {
            MotionCommand::MoveForward(DEPTH_SPEED)
        } else if reference > baseline + band {
            MotionCommand::MoveBackward(DEPTH_SPEED)
        } else {
            MotionCommand::neutral(Axis::Pitch)
        }
    }
}

fn neutral_commands() -> Vec<MotionCommand> {
    vec![
        MotionCommand::neutral(Axis::Yaw),
        MotionCommand::neutral(Axis::Vertical),
        MotionCommand::neutral(Axis::Pitch),
    ]
}
