use std::io::Cursor;
use std::sync::atomic::AtomicBool;

use tello_tracker::detect::{RawDetection, StubBackend};
use tello_tracker::device::{Axis, MotionCommand, RecordingDispatcher, TelemetrySnapshot};
use tello_tracker::ingest::PipeFrameSource;
use tello_tracker::tracking::{
    CalibrationOutcome, FrameDecision, FrameGeometry, FrameStep, TrackingLoop, TrackingState,
};

// 600x800: diagonal 1000, tolerance 20, baseline minimum 100, depth band 13.3.
const WIDTH: u32 = 600;
const HEIGHT: u32 = 800;

fn geometry() -> FrameGeometry {
    FrameGeometry::new(WIDTH, HEIGHT)
}

/// Square-in-proportion box centered in the frame, `p..1-p` on both axes.
fn centered(p: f32) -> Vec<RawDetection> {
    vec![RawDetection::new(0.93, p, p, 1.0 - p, 1.0 - p)]
}

fn black_frames(count: usize) -> Cursor<Vec<u8>> {
    Cursor::new(vec![0u8; WIDTH as usize * HEIGHT as usize * 3 * count])
}

fn tracking_loop(
    script: Vec<Vec<RawDetection>>,
    dispatcher: RecordingDispatcher,
) -> TrackingLoop<PipeFrameSource<Cursor<Vec<u8>>>, RecordingDispatcher> {
    let frames = script.len();
    let source = PipeFrameSource::new(black_frames(frames), geometry()).unwrap();
    TrackingLoop::new(
        source,
        Box::new(StubBackend::scripted(script)),
        dispatcher,
        TelemetrySnapshot::new(),
    )
}

fn processed(step: FrameStep) -> FrameDecision {
    match step {
        FrameStep::Processed(decision) => decision,
        other => panic!("expected a processed frame, got {:?}", other),
    }
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("reference distance");
    assert!(
        (actual - expected).abs() < 1e-3,
        "expected {expected}, got {actual}"
    );
}

fn neutral() -> Vec<MotionCommand> {
    vec![
        MotionCommand::neutral(Axis::Yaw),
        MotionCommand::neutral(Axis::Vertical),
        MotionCommand::neutral(Axis::Pitch),
    ]
}

#[test]
fn far_subject_then_baseline_then_loss_and_recovery() {
    let dispatcher = RecordingDispatcher::new();
    let mut tracking = tracking_loop(
        vec![
            centered(0.46),  // diagonal 80: below the 100 minimum
            centered(0.35),  // diagonal 300: baseline
            vec![],          // subject gone
            centered(0.345), // diagonal 310: recovery
        ],
        dispatcher.clone(),
    );

    let first = processed(tracking.run_frame().unwrap());
    assert_eq!(first.state, TrackingState::Uncalibrated);
    assert_eq!(
        first.commands,
        vec![MotionCommand::Ascend(50), MotionCommand::Descend(50)]
    );
    assert!(matches!(
        first.calibration,
        Some(CalibrationOutcome::Rejected { .. })
    ));
    // Up, down, then level: the gesture leaves no vertical drift behind.
    let throttle: Vec<i8> = dispatcher.rc_updates().iter().map(|rc| rc.throttle).collect();
    assert_eq!(throttle, vec![50, -50, 0]);
    assert_eq!(dispatcher.rc().throttle, 0);

    let second = processed(tracking.run_frame().unwrap());
    assert_eq!(second.state, TrackingState::Tracking);
    assert!(matches!(
        second.calibration,
        Some(CalibrationOutcome::Established { .. })
    ));
    assert_eq!(second.commands, neutral());
    let baseline = tracking
        .controller()
        .calibrator()
        .baseline_distance()
        .expect("baseline latched");
    assert!((baseline - 300.0).abs() < 1e-3);

    let third = processed(tracking.run_frame().unwrap());
    assert_eq!(third.state, TrackingState::Lost);
    assert_eq!(third.commands, neutral());

    let fourth = processed(tracking.run_frame().unwrap());
    assert_eq!(fourth.state, TrackingState::Tracking);
    assert_eq!(fourth.commands, neutral());
    assert_close(fourth.reference_distance, 310.0);
    assert_eq!(
        tracking.controller().calibrator().baseline_distance(),
        Some(baseline)
    );

    assert!(matches!(tracking.run_frame().unwrap(), FrameStep::Closed));

    let mut expected = vec![MotionCommand::Ascend(50), MotionCommand::Descend(50)];
    expected.extend(neutral());
    expected.extend(neutral());
    expected.extend(neutral());
    assert_eq!(dispatcher.motions(), expected);
}

#[test]
fn depth_follows_apparent_size_against_baseline() {
    let dispatcher = RecordingDispatcher::new();
    let mut tracking = tracking_loop(
        vec![
            centered(0.35),  // baseline 300
            centered(0.335), // 330: closer than the band allows
            centered(0.345), // 310: inside the band
            centered(0.375), // 250: too far
        ],
        dispatcher.clone(),
    );

    processed(tracking.run_frame().unwrap());

    let closer = processed(tracking.run_frame().unwrap());
    assert_close(closer.reference_distance, 330.0);
    assert_eq!(
        closer.command_for(Axis::Pitch),
        Some(MotionCommand::MoveBackward(30))
    );

    let steady = processed(tracking.run_frame().unwrap());
    assert_eq!(
        steady.command_for(Axis::Pitch),
        Some(MotionCommand::neutral(Axis::Pitch))
    );

    let farther = processed(tracking.run_frame().unwrap());
    assert_close(farther.reference_distance, 250.0);
    assert_eq!(
        farther.command_for(Axis::Pitch),
        Some(MotionCommand::MoveForward(30))
    );
    assert_eq!(dispatcher.rc().pitch, 30);
}

#[test]
fn off_center_subject_steers_yaw_and_height() {
    let dispatcher = RecordingDispatcher::new();
    let mut tracking = tracking_loop(
        vec![
            centered(0.35),
            // Left half, near the top.
            vec![RawDetection::new(0.8, 0.125, 0.0625, 0.375, 0.375)],
            // Right half, near the bottom.
            vec![RawDetection::new(0.8, 0.625, 0.625, 0.875, 0.9375)],
        ],
        dispatcher.clone(),
    );

    processed(tracking.run_frame().unwrap());

    let left = processed(tracking.run_frame().unwrap());
    assert_eq!(
        left.command_for(Axis::Yaw),
        Some(MotionCommand::CounterRotate(15))
    );
    assert_eq!(
        left.command_for(Axis::Vertical),
        Some(MotionCommand::Ascend(30))
    );

    let right = processed(tracking.run_frame().unwrap());
    assert_eq!(right.command_for(Axis::Yaw), Some(MotionCommand::Rotate(30)));
    assert_eq!(
        right.command_for(Axis::Vertical),
        Some(MotionCommand::Descend(30))
    );

    let rc = dispatcher.rc();
    assert_eq!((rc.yaw, rc.throttle), (30, -30));
}

#[test]
fn run_consumes_the_whole_stream() {
    let dispatcher = RecordingDispatcher::new();
    let mut tracking = tracking_loop(
        vec![centered(0.35), vec![], vec![], centered(0.35)],
        dispatcher.clone(),
    );

    tracking.run(&AtomicBool::new(false)).unwrap();

    assert_eq!(tracking.stats().frames, 4);
    assert_eq!(tracking.stats().skipped, 0);
    assert_eq!(tracking.controller().session().state, TrackingState::Tracking);
    assert_eq!(dispatcher.motions().len(), 12);
}
