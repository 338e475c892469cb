//! Process-wide resources for one flight and their single release path.
//!
//! Thread layout:
//! - main thread: the lifecycle handler (`EventRouter::run`)
//! - tracking loop: decoder output → detector → controller → link
//! - video relay: lifecycle handler → decoder input
//! - link listeners: command replies, state and video datagrams → events

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::config::TrackerConfig;
use crate::detect::DetectorBackend;
use crate::device::{CommandDispatcher, LinkListeners, MotionCommand, TelemetrySnapshot, TelloLink};
use crate::ingest::{spawn_video_relay, FfmpegDecoder, RelayStats};
use crate::lifecycle::{EventRouter, LifecycleEvent};
use crate::tracking::TrackingLoop;

/// Everything one run owns. Dropping a session shuts it down.
pub struct Session {
    config: TrackerConfig,
    land_after: Duration,
    link: TelloLink,
    telemetry: TelemetrySnapshot,
    stop: Arc<AtomicBool>,
    events_tx: Sender<LifecycleEvent>,
    events_rx: Receiver<LifecycleEvent>,
    video_tx: Option<SyncSender<Vec<u8>>>,
    decoder: Option<FfmpegDecoder>,
    relay: Option<JoinHandle<RelayStats>>,
    tracking: Option<JoinHandle<Result<()>>>,
    listeners: Option<LinkListeners>,
}

impl Session {
    /// Open the link, start the decoder, relay and tracking threads, and
    /// begin the handshake.
    pub fn start(
        config: TrackerConfig,
        detector: Box<dyn DetectorBackend>,
        land_after: Duration,
    ) -> Result<Self> {
        let link = TelloLink::open(&config.link)?;
        let telemetry = TelemetrySnapshot::new();
        let stop = Arc::new(AtomicBool::new(false));
        let (events_tx, events_rx) = mpsc::channel();

        let (decoder, decoder_input, frames) =
            FfmpegDecoder::spawn(&config.decoder.ffmpeg_path, config.frame)?;
        let (video_tx, video_rx) = mpsc::sync_channel(config.decoder.relay_queue);
        let relay = spawn_video_relay(video_rx, decoder_input);

        let mut tracking_loop =
            TrackingLoop::new(frames, detector, link.clone(), telemetry.clone())
                .with_rebaseline_after(config.rebaseline_after_lost_frames)
                .with_status_interval(config.status_interval);
        let (flag, done_tx) = (stop.clone(), events_tx.clone());
        let tracking = std::thread::Builder::new()
            .name("tracking".into())
            .spawn(move || {
                let result = tracking_loop.run(&flag);
                if let Err(e) = &result {
                    log::error!("tracking loop failed: {}", e);
                }
                let _ = done_tx.send(LifecycleEvent::Shutdown);
                result
            })
            .map_err(|e| anyhow!("failed to start tracking thread: {}", e))?;

        let mut session = Self {
            config,
            land_after,
            link,
            telemetry,
            stop,
            events_tx,
            events_rx,
            video_tx: Some(video_tx),
            decoder: Some(decoder),
            relay: Some(relay),
            tracking: Some(tracking),
            listeners: None,
        };

        match session
            .link
            .spawn_listeners(&session.config.link, session.events_tx.clone())
        {
            Ok(listeners) => session.listeners = Some(listeners),
            Err(e) => {
                let _ = session.shutdown();
                return Err(e);
            }
        }
        Ok(session)
    }

    /// Sender for injecting events from outside, e.g. a signal handler.
    pub fn events(&self) -> Sender<LifecycleEvent> {
        self.events_tx.clone()
    }

    /// Run the lifecycle handler on the calling thread until shutdown, a
    /// lost link or the end of the video stream, then release everything.
    pub fn run(mut self) -> Result<()> {
        let video_tx = self
            .video_tx
            .take()
            .ok_or_else(|| anyhow!("session already ran"))?;
        let mut router = EventRouter::new(
            self.link.clone(),
            self.telemetry.clone(),
            self.land_after,
            self.config.keepalive_interval,
        )
        .with_video_sink(video_tx);

        log::info!(
            "waiting for the drone; landing {}s after takeoff",
            self.land_after.as_secs()
        );
        router.run(&self.events_rx);
        log::info!(
            "lifecycle handler stopped: {} video packets forwarded, {} dropped",
            router.forwarded_packets(),
            router.dropped_packets()
        );
        drop(router);

        self.shutdown()
    }

    /// Stop every thread, land and kill the decoder. Safe to call again.
    pub fn shutdown(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        self.video_tx = None;

        // Killing the decoder unblocks a tracking loop waiting on a frame.
        if let Some(mut decoder) = self.decoder.take() {
            decoder.kill();
        }

        let mut tracking_result = Ok(());
        if let Some(handle) = self.tracking.take() {
            tracking_result = match handle.join() {
                Ok(result) => result,
                Err(_) => Err(anyhow!("tracking thread panicked")),
            };
        }

        if let Err(e) = self.link.dispatch(MotionCommand::Land) {
            log::error!("land on shutdown failed: {}", e);
        }

        if let Some(handle) = self.relay.take() {
            match handle.join() {
                Ok(stats) => log::debug!("video relay stats: {:?}", stats),
                Err(_) => log::warn!("video relay thread panicked"),
            }
        }
        if let Some(listeners) = self.listeners.take() {
            listeners.stop();
        }
        tracking_result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("session shutdown: {}", e);
        }
    }
}
