use std::sync::{Arc, Mutex};

use anyhow::Result;

use super::command::{MotionCommand, RcChannels, StreamRequest};

/// Executes motion primitives on the device.
///
/// Dispatch is fire-and-forget: an `Ok` means the command left the process,
/// not that the drone acted on it. Implementations share state internally so
/// the lifecycle handler and the tracking loop can hold clones.
pub trait CommandDispatcher: Send + Sync {
    fn dispatch(&self, command: MotionCommand) -> Result<()>;

    /// Issue one frame's commands. Links that can batch axis updates should
    /// override this.
    fn dispatch_frame(&self, commands: &[MotionCommand]) -> Result<()> {
        for command in commands {
            self.dispatch(*command)?;
        }
        Ok(())
    }

    fn request(&self, request: StreamRequest) -> Result<()>;
}

/// Coarse flight phase, used to make TakeOff and Land idempotent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlightPhase {
    #[default]
    Grounded,
    Airborne,
    Landed,
}

impl FlightPhase {
    /// Advance the phase for a flight command. Returns false when the command
    /// would be a repeat and must not reach the device.
    pub fn admit(&mut self, command: MotionCommand) -> bool {
        match (command, *self) {
            (MotionCommand::TakeOff, FlightPhase::Airborne) => false,
            (MotionCommand::TakeOff, _) => {
                *self = FlightPhase::Airborne;
                true
            }
            (MotionCommand::Land, FlightPhase::Airborne) => {
                *self = FlightPhase::Landed;
                true
            }
            (MotionCommand::Land, _) => false,
            _ => true,
        }
    }
}

/// Something a dispatcher sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatched {
    Motion(MotionCommand),
    Stream(StreamRequest),
}

#[derive(Debug, Default)]
struct Recording {
    log: Vec<Dispatched>,
    phase: FlightPhase,
    rc: RcChannels,
    rc_updates: Vec<RcChannels>,
}

/// In-memory dispatcher for tests and dry runs.
///
/// Applies the same level-set and flight-phase rules as the UDP link.
#[derive(Clone, Debug, Default)]
pub struct RecordingDispatcher {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Dispatched> {
        self.with(|rec| rec.log.clone())
    }

    pub fn motions(&self) -> Vec<MotionCommand> {
        self.with(|rec| {
            rec.log
                .iter()
                .filter_map(|entry| match entry {
                    Dispatched::Motion(cmd) => Some(*cmd),
                    Dispatched::Stream(_) => None,
                })
                .collect()
        })
    }

    pub fn count(&self, entry: Dispatched) -> usize {
        self.with(|rec| rec.log.iter().filter(|e| **e == entry).count())
    }

    pub fn rc(&self) -> RcChannels {
        self.with(|rec| rec.rc)
    }

    pub fn phase(&self) -> FlightPhase {
        self.with(|rec| rec.phase)
    }

    /// Every `rc` state the link would have sent, in order.
    pub fn rc_updates(&self) -> Vec<RcChannels> {
        self.with(|rec| rec.rc_updates.clone())
    }

    fn with<T>(&self, f: impl FnOnce(&mut Recording) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }
}

impl CommandDispatcher for RecordingDispatcher {
    fn dispatch(&self, command: MotionCommand) -> Result<()> {
        self.with(|rec| {
            if command.axis().is_some() {
                rec.rc.apply(command);
                let rc = rec.rc;
                rec.rc_updates.push(rc);
                rec.log.push(Dispatched::Motion(command));
            } else if rec.phase.admit(command) {
                rec.log.push(Dispatched::Motion(command));
            }
        });
        Ok(())
    }

    fn dispatch_frame(&self, commands: &[MotionCommand]) -> Result<()> {
        self.with(|rec| {
            for command in commands {
                if command.axis().is_some() || rec.phase.admit(*command) {
                    rec.log.push(Dispatched::Motion(*command));
                }
            }
            let updates = rec.rc.frame_updates(commands);
            rec.rc_updates.extend(updates);
        });
        Ok(())
    }

    fn request(&self, request: StreamRequest) -> Result<()> {
        self.with(|rec| rec.log.push(Dispatched::Stream(request)));
        Ok(())
    }
}
