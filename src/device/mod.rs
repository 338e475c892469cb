//! Drone-side plumbing.
//!
//! - `command`: motion primitives, stream requests and `rc` channel levels
//! - `dispatcher`: the `CommandDispatcher` seam and an in-memory recorder
//! - `telemetry`: state datagram parsing and the shared snapshot
//! - `tello`: the UDP text-SDK link

mod command;
mod dispatcher;
mod telemetry;
pub mod tello;

pub use command::{Axis, MotionCommand, RcChannels, StreamRequest};
pub use dispatcher::{CommandDispatcher, Dispatched, FlightPhase, RecordingDispatcher};
pub use telemetry::{Telemetry, TelemetrySnapshot};
pub use tello::{LinkListeners, TelloLink};
