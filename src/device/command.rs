/// Motion axis a command acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Yaw,
    Vertical,
    Pitch,
}

/// Motion primitive sent to the drone.
///
/// Axis commands are level-set: the magnitude (a percentage, 0 = stop) replaces
/// whatever that axis was doing before, so repeating a command is harmless.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionCommand {
    Rotate(u8),
    CounterRotate(u8),
    Ascend(u8),
    Descend(u8),
    MoveForward(u8),
    MoveBackward(u8),
    TakeOff,
    Land,
}

impl MotionCommand {
    /// Stop command for an axis.
    pub fn neutral(axis: Axis) -> Self {
        match axis {
            Axis::Yaw => MotionCommand::Rotate(0),
            Axis::Vertical => MotionCommand::Ascend(0),
            Axis::Pitch => MotionCommand::MoveForward(0),
        }
    }

    pub fn axis(&self) -> Option<Axis> {
        match self {
            MotionCommand::Rotate(_) | MotionCommand::CounterRotate(_) => Some(Axis::Yaw),
            MotionCommand::Ascend(_) | MotionCommand::Descend(_) => Some(Axis::Vertical),
            MotionCommand::MoveForward(_) | MotionCommand::MoveBackward(_) => Some(Axis::Pitch),
            MotionCommand::TakeOff | MotionCommand::Land => None,
        }
    }

    /// Unsigned magnitude; 0 for flight-phase commands.
    pub fn magnitude(&self) -> u8 {
        self.signed_level().unsigned_abs()
    }

    /// Signed channel level in the drone's convention: clockwise, up and
    /// forward are positive.
    pub fn signed_level(&self) -> i8 {
        match *self {
            MotionCommand::Rotate(m) | MotionCommand::Ascend(m) | MotionCommand::MoveForward(m) => {
                clamp_percent(m)
            }
            MotionCommand::CounterRotate(m)
            | MotionCommand::Descend(m)
            | MotionCommand::MoveBackward(m) => -clamp_percent(m),
            MotionCommand::TakeOff | MotionCommand::Land => 0,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.axis().is_some() && self.magnitude() == 0
    }
}

fn axis_index(axis: Axis) -> usize {
    match axis {
        Axis::Yaw => 0,
        Axis::Vertical => 1,
        Axis::Pitch => 2,
    }
}

fn clamp_percent(m: u8) -> i8 {
    m.min(100) as i8
}

/// Video stream control issued by the lifecycle handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamRequest {
    StartVideo,
    AutoBitrate,
    Exposure(i8),
}

/// Level of each `rc` channel, as understood by the Tello SDK.
///
/// `roll` is never driven by the tracker but is part of the wire format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RcChannels {
    pub roll: i8,
    pub pitch: i8,
    pub throttle: i8,
    pub yaw: i8,
}

impl RcChannels {
    /// Level-set the channel for an axis command. Returns true when the
    /// channel value changed.
    pub fn apply(&mut self, command: MotionCommand) -> bool {
        let level = command.signed_level();
        let slot = match command.axis() {
            Some(Axis::Yaw) => &mut self.yaw,
            Some(Axis::Vertical) => &mut self.throttle,
            Some(Axis::Pitch) => &mut self.pitch,
            None => return false,
        };
        let changed = *slot != level;
        *slot = level;
        changed
    }

    /// Apply one frame's axis commands and return the channel states to send,
    /// in order.
    ///
    /// A frame normally yields one state. An axis commanded more than once in
    /// the same frame is a pulse (e.g. ascend then descend): every step is
    /// sent on its own and the axis ends the frame at neutral.
    pub fn frame_updates(&mut self, commands: &[MotionCommand]) -> Vec<RcChannels> {
        let mut touched = [0u8; 3];
        let mut updates = Vec::new();
        for command in commands {
            let Some(axis) = command.axis() else {
                continue;
            };
            let slot = axis_index(axis);
            if touched[slot] > 0 {
                updates.push(*self);
            }
            touched[slot] = touched[slot].saturating_add(1);
            self.apply(*command);
        }
        if touched.iter().all(|n| *n == 0) {
            return updates;
        }
        updates.push(*self);

        let mut settled = false;
        for axis in [Axis::Yaw, Axis::Vertical, Axis::Pitch] {
            if touched[axis_index(axis)] > 1 {
                settled |= self.apply(MotionCommand::neutral(axis));
            }
        }
        if settled {
            updates.push(*self);
        }
        updates
    }

    /// SDK text form: `rc <roll> <pitch> <throttle> <yaw>`.
    pub fn to_sdk(&self) -> String {
        format!("rc {} {} {} {}", self.roll, self.pitch, self.throttle, self.yaw)
    }
}
