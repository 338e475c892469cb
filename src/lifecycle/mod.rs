//! Device lifecycle handling.
//!
//! Connection, telemetry, video packets and timers all arrive as
//! `LifecycleEvent`s on one queue and are consumed by a single `EventRouter`,
//! so takeoff and landing have exactly one writer.

mod events;
mod router;
mod scheduler;

pub use events::{LifecycleEvent, TimerKind};
pub use router::{EventRouter, Flow};
pub use scheduler::Scheduler;
