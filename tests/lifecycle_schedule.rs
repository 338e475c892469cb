use std::sync::mpsc;
use std::time::{Duration, Instant};

use tello_tracker::device::{
    Dispatched, FlightPhase, MotionCommand, RecordingDispatcher, StreamRequest, Telemetry,
    TelemetrySnapshot,
};
use tello_tracker::lifecycle::{EventRouter, Flow, LifecycleEvent, TimerKind};

const LAND_AFTER: Duration = Duration::from_secs(3);
const KEEPALIVE: Duration = Duration::from_millis(250);

fn router(dispatcher: &RecordingDispatcher) -> EventRouter<RecordingDispatcher> {
    EventRouter::new(
        dispatcher.clone(),
        TelemetrySnapshot::new(),
        LAND_AFTER,
        KEEPALIVE,
    )
}

fn lands(dispatcher: &RecordingDispatcher) -> usize {
    dispatcher.count(Dispatched::Motion(MotionCommand::Land))
}

fn keepalives(dispatcher: &RecordingDispatcher) -> usize {
    dispatcher.count(Dispatched::Stream(StreamRequest::StartVideo))
}

#[test]
fn connect_starts_stream_takes_off_and_schedules_landing() {
    let dispatcher = RecordingDispatcher::new();
    let mut router = router(&dispatcher);
    let start = Instant::now();

    assert!(!router.is_connected());
    assert_eq!(router.handle(LifecycleEvent::Connected, start), Flow::Continue);
    assert!(router.is_connected());

    assert_eq!(
        dispatcher.entries(),
        vec![
            Dispatched::Stream(StreamRequest::StartVideo),
            Dispatched::Stream(StreamRequest::AutoBitrate),
            Dispatched::Stream(StreamRequest::Exposure(0)),
            Dispatched::Motion(MotionCommand::TakeOff),
        ]
    );
    assert_eq!(dispatcher.phase(), FlightPhase::Airborne);
    assert!(router.scheduler().is_scheduled(TimerKind::Land));
    assert!(router.scheduler().is_scheduled(TimerKind::VideoKeepAlive));

    // A second connect notification changes nothing.
    router.handle(LifecycleEvent::Connected, start + Duration::from_millis(10));
    assert_eq!(dispatcher.entries().len(), 4);
}

#[test]
fn landing_fires_once_at_the_requested_delay() {
    let dispatcher = RecordingDispatcher::new();
    let mut router = router(&dispatcher);
    let start = Instant::now();
    router.handle(LifecycleEvent::Connected, start);

    router.fire_due(start + LAND_AFTER - Duration::from_millis(1));
    assert_eq!(lands(&dispatcher), 0);

    assert_eq!(router.fire_due(start + LAND_AFTER), Flow::Continue);
    assert_eq!(lands(&dispatcher), 1);
    assert_eq!(dispatcher.phase(), FlightPhase::Landed);
    assert!(!router.scheduler().is_scheduled(TimerKind::Land));

    router.fire_due(start + LAND_AFTER * 2);
    assert_eq!(lands(&dispatcher), 1);
}

#[test]
fn keepalive_reissues_stream_start_on_cadence() {
    let dispatcher = RecordingDispatcher::new();
    let mut router = router(&dispatcher);
    let start = Instant::now();
    router.handle(LifecycleEvent::Connected, start);
    assert_eq!(keepalives(&dispatcher), 1);

    for tick in 1..=4 {
        router.fire_due(start + KEEPALIVE * tick);
    }
    assert_eq!(keepalives(&dispatcher), 5);

    // Keep-alive survives the landing.
    router.fire_due(start + LAND_AFTER);
    assert!(router.scheduler().is_scheduled(TimerKind::VideoKeepAlive));
}

#[test]
fn shutdown_after_scheduled_landing_does_not_land_twice() {
    let dispatcher = RecordingDispatcher::new();
    let mut router = router(&dispatcher);
    let start = Instant::now();
    router.handle(LifecycleEvent::Connected, start);
    router.fire_due(start + LAND_AFTER);

    assert_eq!(
        router.handle(LifecycleEvent::Shutdown, start + LAND_AFTER * 2),
        Flow::Stop
    );
    assert_eq!(lands(&dispatcher), 1);
}

#[test]
fn link_loss_lands_and_stops() {
    let dispatcher = RecordingDispatcher::new();
    let mut router = router(&dispatcher);
    let start = Instant::now();
    router.handle(LifecycleEvent::Connected, start);

    let flow = router.handle(
        LifecycleEvent::LinkLost("state silent for 10s".to_string()),
        start + Duration::from_secs(1),
    );
    assert_eq!(flow, Flow::Stop);
    assert_eq!(lands(&dispatcher), 1);
}

#[test]
fn telemetry_is_stored_without_commands() {
    let dispatcher = RecordingDispatcher::new();
    let snapshot = TelemetrySnapshot::new();
    let mut router = EventRouter::new(dispatcher.clone(), snapshot.clone(), LAND_AFTER, KEEPALIVE);

    let telemetry = Telemetry::parse("pitch:0;roll:0;yaw:-4;h:80;bat:61;time:12;").unwrap();
    router.handle(LifecycleEvent::Telemetry(telemetry), Instant::now());

    assert_eq!(snapshot.latest(), Some(telemetry));
    assert!(dispatcher.entries().is_empty());
}

#[test]
fn video_is_forwarded_then_dropped_when_relay_backs_up() {
    let dispatcher = RecordingDispatcher::new();
    let (tx, rx) = mpsc::sync_channel(2);
    let mut router = router(&dispatcher).with_video_sink(tx);
    let now = Instant::now();

    for n in 0..5u8 {
        router.handle(LifecycleEvent::VideoPacket(vec![n]), now);
    }
    assert_eq!(router.forwarded_packets(), 2);
    assert_eq!(router.dropped_packets(), 3);
    assert_eq!(rx.try_recv().unwrap(), vec![0]);
    assert_eq!(rx.try_recv().unwrap(), vec![1]);

    drop(rx);
    router.handle(LifecycleEvent::VideoPacket(vec![9]), now);
    router.handle(LifecycleEvent::VideoPacket(vec![10]), now);
    assert_eq!(router.forwarded_packets(), 2);
}

#[test]
fn run_delivers_timers_through_the_event_loop() {
    let dispatcher = RecordingDispatcher::new();
    let mut router = EventRouter::new(
        dispatcher.clone(),
        TelemetrySnapshot::new(),
        Duration::from_millis(50),
        Duration::from_millis(20),
    );
    let (tx, rx) = mpsc::channel();
    tx.send(LifecycleEvent::Connected).unwrap();

    let shutdown = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        tx.send(LifecycleEvent::Shutdown).unwrap();
    });
    router.run(&rx);
    shutdown.join().unwrap();

    assert_eq!(lands(&dispatcher), 1);
    assert!(keepalives(&dispatcher) >= 2);
    assert_eq!(dispatcher.phase(), FlightPhase::Landed);
}
