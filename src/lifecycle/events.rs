use crate::device::Telemetry;

/// Timers owned by the lifecycle handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// One-shot end of flight.
    Land,
    /// Recurring re-request of the video stream.
    VideoKeepAlive,
}

/// Everything the lifecycle handler reacts to, in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleEvent {
    /// The device answered the SDK handshake.
    Connected,
    Telemetry(Telemetry),
    /// Raw encoded video bytes from the device.
    VideoPacket(Vec<u8>),
    /// The device link failed; not recovered.
    LinkLost(String),
    Timer(TimerKind),
    /// Local stop request (Ctrl-C or the tracking loop ending).
    Shutdown,
}
