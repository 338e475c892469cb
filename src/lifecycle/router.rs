use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::{Duration, Instant};

use crate::device::{CommandDispatcher, MotionCommand, StreamRequest, TelemetrySnapshot};

use super::events::{LifecycleEvent, TimerKind};
use super::scheduler::Scheduler;

/// Whether the handler keeps consuming events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Single consumer of device events and timers.
///
/// Owns flight-phase transitions (takeoff, scheduled landing) and the video
/// keep-alive; never waits on frame processing.
pub struct EventRouter<C: CommandDispatcher> {
    dispatcher: C,
    telemetry: TelemetrySnapshot,
    video: Option<SyncSender<Vec<u8>>>,
    scheduler: Scheduler,
    land_after: Duration,
    keepalive_interval: Duration,
    connected: bool,
    forwarded_packets: u64,
    dropped_packets: u64,
}

impl<C: CommandDispatcher> EventRouter<C> {
    pub fn new(
        dispatcher: C,
        telemetry: TelemetrySnapshot,
        land_after: Duration,
        keepalive_interval: Duration,
    ) -> Self {
        Self {
            dispatcher,
            telemetry,
            video: None,
            scheduler: Scheduler::new(),
            land_after,
            keepalive_interval,
            connected: false,
            forwarded_packets: 0,
            dropped_packets: 0,
        }
    }

    /// Forward video packets to the decoder relay through `sink`.
    pub fn with_video_sink(mut self, sink: SyncSender<Vec<u8>>) -> Self {
        self.video = Some(sink);
        self
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn forwarded_packets(&self) -> u64 {
        self.forwarded_packets
    }

    pub fn dropped_packets(&self) -> u64 {
        self.dropped_packets
    }

    /// Consume events until a stop event or until every sender is gone.
    pub fn run(&mut self, events: &Receiver<LifecycleEvent>) {
        loop {
            if self.fire_due(Instant::now()) == Flow::Stop {
                return;
            }
            let event = match self.scheduler.next_due() {
                Some(due) => {
                    match events.recv_timeout(due.saturating_duration_since(Instant::now())) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => {
                            log::warn!("event queue closed; lifecycle handler exiting");
                            return;
                        }
                    }
                }
                None => match events.recv() {
                    Ok(event) => event,
                    Err(_) => {
                        log::warn!("event queue closed; lifecycle handler exiting");
                        return;
                    }
                },
            };
            if self.handle(event, Instant::now()) == Flow::Stop {
                return;
            }
        }
    }

    /// Deliver every timer due at `now` as a `Timer` event.
    pub fn fire_due(&mut self, now: Instant) -> Flow {
        for kind in self.scheduler.pop_due(now) {
            if self.handle(LifecycleEvent::Timer(kind), now) == Flow::Stop {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    pub fn handle(&mut self, event: LifecycleEvent, now: Instant) -> Flow {
        match event {
            LifecycleEvent::Connected => {
                self.on_connected(now);
                Flow::Continue
            }
            LifecycleEvent::Telemetry(telemetry) => {
                log::debug!("battery: {}%", telemetry.battery_percent);
                self.telemetry.store(telemetry);
                Flow::Continue
            }
            LifecycleEvent::VideoPacket(packet) => {
                self.forward_video(packet);
                Flow::Continue
            }
            LifecycleEvent::LinkLost(reason) => {
                log::error!("device link lost: {}", reason);
                self.land();
                Flow::Stop
            }
            LifecycleEvent::Timer(TimerKind::Land) => {
                log::info!("landing timer fired");
                self.land();
                Flow::Continue
            }
            LifecycleEvent::Timer(TimerKind::VideoKeepAlive) => {
                self.request(StreamRequest::StartVideo);
                Flow::Continue
            }
            LifecycleEvent::Shutdown => {
                log::info!("shutdown requested; landing");
                self.land();
                Flow::Stop
            }
        }
    }

    fn on_connected(&mut self, now: Instant) {
        if self.connected {
            log::debug!("repeated connect notification ignored");
            return;
        }
        self.connected = true;
        log::info!("connected");

        self.request(StreamRequest::StartVideo);
        self.request(StreamRequest::AutoBitrate);
        self.request(StreamRequest::Exposure(0));
        if let Err(err) = self.dispatcher.dispatch(MotionCommand::TakeOff) {
            log::warn!("takeoff command failed: {}", err);
        }

        self.scheduler
            .schedule_once(TimerKind::Land, now + self.land_after);
        self.scheduler.schedule_every(
            TimerKind::VideoKeepAlive,
            now + self.keepalive_interval,
            self.keepalive_interval,
        );
        log::info!("landing in {} seconds", self.land_after.as_secs());
    }

    fn forward_video(&mut self, packet: Vec<u8>) {
        let Some(sink) = &self.video else {
            return;
        };
        match sink.try_send(packet) {
            Ok(()) => self.forwarded_packets += 1,
            Err(TrySendError::Full(_)) => {
                self.dropped_packets += 1;
                if self.dropped_packets.is_power_of_two() {
                    log::warn!(
                        "decoder input backlogged; {} video packets dropped",
                        self.dropped_packets
                    );
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                log::error!("video relay stopped; discarding further video");
                self.video = None;
            }
        }
    }

    fn land(&mut self) {
        if let Err(err) = self.dispatcher.dispatch(MotionCommand::Land) {
            log::warn!("land command failed: {}", err);
        }
    }

    fn request(&mut self, request: StreamRequest) {
        if let Err(err) = self.dispatcher.request(request) {
            log::warn!("{:?} request failed: {}", request, err);
        }
    }
}
