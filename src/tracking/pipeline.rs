//! The blocking per-frame loop: read → detect → control → dispatch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::detect::DetectorBackend;
use crate::device::{CommandDispatcher, TelemetrySnapshot};
use crate::frame::{FrameReadError, FrameSource};

use super::controller::{FrameDecision, TrackingController, TrackingState};

/// Outcome of one loop iteration.
#[derive(Debug)]
pub enum FrameStep {
    /// A frame was read, detected and acted on.
    Processed(FrameDecision),
    /// The frame was dropped (short read or detector failure).
    Skipped,
    /// The frame stream ended on a frame boundary.
    Closed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub skipped: u64,
    pub partial_reads: u64,
    pub detector_errors: u64,
    pub dispatch_errors: u64,
}

/// Drives the controller from a frame source.
pub struct TrackingLoop<S: FrameSource, C: CommandDispatcher> {
    source: S,
    detector: Box<dyn DetectorBackend>,
    controller: TrackingController,
    dispatcher: C,
    telemetry: TelemetrySnapshot,
    status_interval: Duration,
    last_status: Instant,
    stats: LoopStats,
}

impl<S: FrameSource, C: CommandDispatcher> TrackingLoop<S, C> {
    pub fn new(
        source: S,
        detector: Box<dyn DetectorBackend>,
        dispatcher: C,
        telemetry: TelemetrySnapshot,
    ) -> Self {
        let controller = TrackingController::new(source.geometry());
        Self {
            source,
            detector,
            controller,
            dispatcher,
            telemetry,
            status_interval: Duration::from_secs(5),
            last_status: Instant::now(),
            stats: LoopStats::default(),
        }
    }

    pub fn with_rebaseline_after(mut self, lost_frames: Option<u32>) -> Self {
        self.controller = self.controller.with_rebaseline_after(lost_frames);
        self
    }

    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    pub fn controller(&self) -> &TrackingController {
        &self.controller
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Run until `stop` is set or the frame stream ends.
    ///
    /// A closed stream returns `Ok`; a read error is returned to the caller.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        log::info!(
            "tracking loop started: {}x{} frames, detector={}, tolerance={:.1}px",
            self.source.geometry().width,
            self.source.geometry().height,
            self.detector.name(),
            self.controller.tolerance()
        );
        while !stop.load(Ordering::SeqCst) {
            match self.run_frame()? {
                FrameStep::Closed => {
                    log::info!("frame stream closed; tracking loop exiting");
                    break;
                }
                FrameStep::Processed(_) | FrameStep::Skipped => {}
            }
            if self.last_status.elapsed() >= self.status_interval {
                self.log_status();
                self.last_status = Instant::now();
            }
        }
        self.log_status();
        Ok(())
    }

    /// Process exactly one frame.
    pub fn run_frame(&mut self) -> Result<FrameStep> {
        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(FrameReadError::Closed) => return Ok(FrameStep::Closed),
            Err(err) if err.is_transient() => {
                log::warn!("dropping frame: {}", err);
                self.stats.partial_reads += 1;
                self.stats.skipped += 1;
                return Ok(FrameStep::Skipped);
            }
            Err(err) => return Err(err.into()),
        };
        self.stats.frames += 1;

        let result = match self
            .detector
            .detect(frame.pixels(), frame.width, frame.height)
        {
            Ok(result) => result,
            Err(e) => {
                log::warn!("detector failed on frame {}: {}", self.stats.frames, e);
                self.stats.detector_errors += 1;
                self.stats.skipped += 1;
                return Ok(FrameStep::Skipped);
            }
        };

        let detection = result.first_accepted(frame.geometry());
        let decision = self.controller.step(detection.as_ref());

        if let Err(e) = self.dispatcher.dispatch_frame(&decision.commands) {
            log::warn!("command dispatch failed: {}", e);
            self.stats.dispatch_errors += 1;
        }

        log::debug!(
            "frame {}: state={:?} detection={} reference={} commands={:?}",
            self.stats.frames,
            decision.state,
            detection
                .map(|d| format!("{:.2}@{:.1}", d.confidence, d.diagonal()))
                .unwrap_or_else(|| "none".to_string()),
            decision
                .reference_distance
                .map(|r| format!("{:.1}", r))
                .unwrap_or_else(|| "-".to_string()),
            decision.commands
        );
        Ok(FrameStep::Processed(decision))
    }

    fn log_status(&self) {
        let session = self.controller.session();
        let baseline = self
            .controller
            .calibrator()
            .baseline_distance()
            .map(|d| format!("{:.1}", d))
            .unwrap_or_else(|| "-".to_string());
        let battery = self
            .telemetry
            .latest()
            .map(|t| format!("{}%", t.battery_percent))
            .unwrap_or_else(|| "?".to_string());
        log::info!(
            "tracking: frames={} skipped={} state={} baseline={} lost_frames={} battery={}",
            self.stats.frames,
            self.stats.skipped,
            state_label(session.state),
            baseline,
            session.lost_frames,
            battery
        );
    }
}

fn state_label(state: TrackingState) -> &'static str {
    match state {
        TrackingState::Uncalibrated => "uncalibrated",
        TrackingState::Tracking => "tracking",
        TrackingState::Lost => "lost",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{RawDetection, StubBackend};
    use crate::device::{MotionCommand, RecordingDispatcher};
    use crate::ingest::PipeFrameSource;
    use crate::tracking::FrameGeometry;
    use anyhow::anyhow;
    use std::io::Cursor;

    struct FailingDetector;

    impl DetectorBackend for FailingDetector {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _: &[u8], _: u32, _: u32) -> Result<crate::detect::DetectionResult> {
            Err(anyhow!("inference exploded"))
        }
    }

    fn frames(geometry: FrameGeometry, count: usize, trailing: usize) -> Cursor<Vec<u8>> {
        let len = geometry.width as usize * geometry.height as usize * 3;
        Cursor::new(vec![0u8; len * count + trailing])
    }

    #[test]
    fn partial_frame_is_skipped_and_stream_end_stops_loop() {
        let geometry = FrameGeometry::new(4, 4);
        let source = PipeFrameSource::new(frames(geometry, 2, 10), geometry).unwrap();
        let dispatcher = RecordingDispatcher::new();
        let mut tracking = TrackingLoop::new(
            source,
            Box::new(StubBackend::new()),
            dispatcher.clone(),
            TelemetrySnapshot::new(),
        );

        tracking.run(&AtomicBool::new(false)).unwrap();

        let stats = tracking.stats();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.partial_reads, 1);
        assert_eq!(stats.skipped, 1);
        // Two uncalibrated frames without a subject: neutral on every axis.
        assert_eq!(dispatcher.motions().len(), 6);
        assert!(dispatcher.motions().iter().all(MotionCommand::is_neutral));
    }

    #[test]
    fn detector_error_skips_frame_without_commands() {
        let geometry = FrameGeometry::new(4, 4);
        let source = PipeFrameSource::new(frames(geometry, 1, 0), geometry).unwrap();
        let dispatcher = RecordingDispatcher::new();
        let mut tracking = TrackingLoop::new(
            source,
            Box::new(FailingDetector),
            dispatcher.clone(),
            TelemetrySnapshot::new(),
        );

        assert!(matches!(tracking.run_frame().unwrap(), FrameStep::Skipped));
        assert!(dispatcher.entries().is_empty());
        assert_eq!(tracking.stats().detector_errors, 1);
        assert!(matches!(tracking.run_frame().unwrap(), FrameStep::Closed));
    }

    #[test]
    fn stop_flag_prevents_further_reads() {
        let geometry = FrameGeometry::new(4, 4);
        let source = PipeFrameSource::new(frames(geometry, 3, 0), geometry).unwrap();
        let mut tracking = TrackingLoop::new(
            source,
            Box::new(StubBackend::new()),
            RecordingDispatcher::new(),
            TelemetrySnapshot::new(),
        );

        tracking.run(&AtomicBool::new(true)).unwrap();
        assert_eq!(tracking.stats().frames, 0);
    }

    #[test]
    fn low_confidence_rows_do_not_reach_the_controller() {
        let geometry = FrameGeometry::new(600, 800);
        let source = PipeFrameSource::new(frames(geometry, 1, 0), geometry).unwrap();
        let weak = RawDetection::new(0.4, 0.25, 0.25, 0.75, 0.75);
        let mut tracking = TrackingLoop::new(
            source,
            Box::new(StubBackend::scripted(vec![vec![weak]])),
            RecordingDispatcher::new(),
            TelemetrySnapshot::new(),
        );

        match tracking.run_frame().unwrap() {
            FrameStep::Processed(decision) => {
                assert_eq!(decision.state, TrackingState::Uncalibrated);
                assert!(decision.calibration.is_none());
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert!(!tracking.controller().calibrator().is_established());
    }
}
