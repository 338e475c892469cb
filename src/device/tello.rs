//! Tello text-SDK link over UDP.
//!
//! Commands go to the drone's port 8889 as ASCII (`command`, `takeoff`,
//! `land`, `streamon`, `setbitrate 0`, `rc a b c d`). The drone answers on the
//! same socket, pushes state datagrams to port 8890 and raw H.264 to port
//! 11111. Listener threads turn those into `LifecycleEvent`s; they never act
//! on the drone themselves.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use super::command::{MotionCommand, RcChannels, StreamRequest};
use super::dispatcher::{CommandDispatcher, FlightPhase};
use super::telemetry::Telemetry;
use crate::config::LinkSettings;
use crate::lifecycle::LifecycleEvent;

/// Largest datagram the drone sends on any port.
const MAX_DATAGRAM: usize = 2048;
/// How often listener threads wake to check for shutdown.
const LISTEN_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Default)]
struct LinkState {
    rc: RcChannels,
    phase: FlightPhase,
    exposure_noted: bool,
}

/// Command side of the link. Cheap to clone; clones share one socket and one
/// rc/flight state.
#[derive(Clone, Debug)]
pub struct TelloLink {
    socket: Arc<UdpSocket>,
    drone_addr: SocketAddr,
    state: Arc<Mutex<LinkState>>,
}

impl TelloLink {
    pub fn open(settings: &LinkSettings) -> Result<Self> {
        let drone_addr: SocketAddr = settings
            .drone_addr
            .parse()
            .with_context(|| format!("invalid drone address '{}'", settings.drone_addr))?;
        let socket = UdpSocket::bind(&settings.command_bind)
            .with_context(|| format!("failed to bind command socket {}", settings.command_bind))?;
        socket
            .set_read_timeout(Some(LISTEN_POLL))
            .context("failed to set command socket timeout")?;
        log::info!(
            "tello link: {} -> {}",
            socket.local_addr().context("command socket address")?,
            drone_addr
        );
        Ok(Self {
            socket: Arc::new(socket),
            drone_addr,
            state: Arc::new(Mutex::new(LinkState::default())),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Send the SDK handshake. The drone answers `ok`.
    pub fn handshake(&self) -> Result<()> {
        self.send("command")
    }

    /// Start the response, state and video listeners.
    pub fn spawn_listeners(
        &self,
        settings: &LinkSettings,
        events: Sender<LifecycleEvent>,
    ) -> Result<LinkListeners> {
        let state_socket = bind_listener(&settings.state_bind, "state")?;
        let video_socket = bind_listener(&settings.video_bind, "video")?;
        let state_addr = state_socket.local_addr()?;
        let video_addr = video_socket.local_addr()?;

        let stop = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(3);

        let link = self.clone();
        let (tx, flag) = (events.clone(), stop.clone());
        let timeout = settings.timeout;
        let retry = settings.connect_retry;
        handles.push(std::thread::spawn(move || {
            link.listen_responses(tx, flag, timeout, retry)
        }));

        let (tx, flag) = (events.clone(), stop.clone());
        handles.push(std::thread::spawn(move || {
            listen_state(state_socket, tx, flag, timeout)
        }));

        let flag = stop.clone();
        handles.push(std::thread::spawn(move || {
            listen_video(video_socket, events, flag)
        }));

        Ok(LinkListeners {
            stop,
            handles,
            state_addr,
            video_addr,
        })
    }

    fn send(&self, text: &str) -> Result<()> {
        self.socket
            .send_to(text.as_bytes(), self.drone_addr)
            .with_context(|| format!("failed to send '{}' to {}", text, self.drone_addr))?;
        log::trace!("sent '{}'", text);
        Ok(())
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, LinkState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("tello link state lock poisoned"))
    }

    fn send_flight(&self, state: &mut LinkState, command: MotionCommand) -> Result<()> {
        if !state.phase.admit(command) {
            log::debug!("{:?} already issued; skipped", command);
            return Ok(());
        }
        match command {
            MotionCommand::TakeOff => self.send("takeoff"),
            MotionCommand::Land => {
                state.rc = RcChannels::default();
                self.send("land")
            }
            _ => Ok(()),
        }
    }

    fn listen_responses(
        &self,
        events: Sender<LifecycleEvent>,
        stop: Arc<AtomicBool>,
        timeout: Duration,
        retry: Duration,
    ) {
        let started = Instant::now();
        let mut last_attempt = Instant::now();
        let mut connected = false;
        let mut buf = [0u8; MAX_DATAGRAM];

        if let Err(err) = self.handshake() {
            log::warn!("handshake send failed: {}", err);
        }

        while !stop.load(Ordering::SeqCst) {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    if from.ip() != self.drone_addr.ip() {
                        continue;
                    }
                    let reply = String::from_utf8_lossy(&buf[..n]);
                    let reply = reply.trim();
                    if !connected && reply == "ok" {
                        connected = true;
                        if events.send(LifecycleEvent::Connected).is_err() {
                            return;
                        }
                    } else {
                        log::debug!("tello replied '{}'", reply);
                    }
                }
                Err(err) if is_timeout(&err) => {
                    if connected {
                        continue;
                    }
                    if started.elapsed() >= timeout {
                        let _ = events.send(LifecycleEvent::LinkLost(format!(
                            "no handshake reply from {} within {}s",
                            self.drone_addr,
                            timeout.as_secs()
                        )));
                        return;
                    }
                    if last_attempt.elapsed() >= retry {
                        last_attempt = Instant::now();
                        log::info!("waiting for tello at {}...", self.drone_addr);
                        if let Err(err) = self.handshake() {
                            log::warn!("handshake send failed: {}", err);
                        }
                    }
                }
                Err(err) => {
                    let _ = events.send(LifecycleEvent::LinkLost(format!(
                        "command socket failed: {}",
                        err
                    )));
                    return;
                }
            }
        }
    }
}

impl CommandDispatcher for TelloLink {
    fn dispatch(&self, command: MotionCommand) -> Result<()> {
        let mut state = self.lock_state()?;
        if command.axis().is_some() {
            state.rc.apply(command);
            let line = state.rc.to_sdk();
            return self.send(&line);
        }
        self.send_flight(&mut state, command)
    }

    /// Level-set every axis in the frame. One `rc` datagram per frame, except
    /// for pulsed axes, which get one per step and end at neutral.
    fn dispatch_frame(&self, commands: &[MotionCommand]) -> Result<()> {
        let mut state = self.lock_state()?;
        for command in commands.iter().filter(|c| c.axis().is_none()) {
            self.send_flight(&mut state, *command)?;
        }
        for update in state.rc.frame_updates(commands) {
            self.send(&update.to_sdk())?;
        }
        Ok(())
    }

    fn request(&self, request: StreamRequest) -> Result<()> {
        match request {
            StreamRequest::StartVideo => self.send("streamon"),
            StreamRequest::AutoBitrate => self.send("setbitrate 0"),
            StreamRequest::Exposure(level) => {
                let mut state = self.lock_state()?;
                if state.exposure_noted {
                    log::debug!("exposure {} skipped", level);
                } else {
                    state.exposure_noted = true;
                    log::info!(
                        "exposure {} requested but the text SDK has no exposure command; skipped",
                        level
                    );
                }
                Ok(())
            }
        }
    }
}

/// Handles to the link's listener threads.
pub struct LinkListeners {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    pub state_addr: SocketAddr,
    pub video_addr: SocketAddr,
}

impl LinkListeners {
    /// Signal every listener and wait for it to exit.
    pub fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.handles {
            if handle.join().is_err() {
                log::warn!("tello listener thread panicked");
            }
        }
    }
}

fn bind_listener(addr: &str, role: &str) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(addr)
        .with_context(|| format!("failed to bind {} socket {}", role, addr))?;
    socket
        .set_read_timeout(Some(LISTEN_POLL))
        .with_context(|| format!("failed to set {} socket timeout", role))?;
    Ok(socket)
}

fn listen_state(
    socket: UdpSocket,
    events: Sender<LifecycleEvent>,
    stop: Arc<AtomicBool>,
    timeout: Duration,
) {
    let mut buf = [0u8; MAX_DATAGRAM];
    let mut last_state: Option<Instant> = None;
    while !stop.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((n, _)) => {
                last_state = Some(Instant::now());
                match Telemetry::parse(&String::from_utf8_lossy(&buf[..n])) {
                    Ok(telemetry) => {
                        if events.send(LifecycleEvent::Telemetry(telemetry)).is_err() {
                            return;
                        }
                    }
                    Err(err) => log::debug!("ignoring state datagram: {}", err),
                }
            }
            Err(err) if is_timeout(&err) => {
                if last_state.is_some_and(|at| at.elapsed() >= timeout) {
                    let _ = events.send(LifecycleEvent::LinkLost(format!(
                        "no state from drone for {}s",
                        timeout.as_secs()
                    )));
                    return;
                }
            }
            Err(err) => {
                let _ = events.send(LifecycleEvent::LinkLost(format!(
                    "state socket failed: {}",
                    err
                )));
                return;
            }
        }
    }
}

fn listen_video(socket: UdpSocket, events: Sender<LifecycleEvent>, stop: Arc<AtomicBool>) {
    let mut buf = [0u8; MAX_DATAGRAM];
    while !stop.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((n, _)) => {
                if events
                    .send(LifecycleEvent::VideoPacket(buf[..n].to_vec()))
                    .is_err()
                {
                    return;
                }
            }
            Err(err) if is_timeout(&err) => {}
            Err(err) => {
                log::error!("video socket failed: {}", err);
                return;
            }
        }
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}
