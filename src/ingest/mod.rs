//! Frame ingestion.
//!
//! Video reaches the tracker in two hops:
//! - `relay`: encoded packets from the lifecycle handler → decoder stdin
//! - `decoder` + `pipe`: decoder stdout → fixed-size BGR24 `Frame`s
//!
//! The ingestion layer MUST NOT:
//! - Block the lifecycle handler (packets are queued, then dropped when full)
//! - Keep frames beyond the tracking-loop iteration that read them

pub mod decoder;
pub mod pipe;
pub mod relay;

pub use decoder::FfmpegDecoder;
pub use pipe::PipeFrameSource;
pub use relay::{relay_packets, spawn_video_relay, RelayStats};
