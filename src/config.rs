use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tracking::FrameGeometry;

const DEFAULT_FRAME_WIDTH: u32 = 400;
const DEFAULT_FRAME_HEIGHT: u32 = 350;
const DEFAULT_DRONE_ADDR: &str = "192.168.10.1:8889";
const DEFAULT_COMMAND_BIND: &str = "0.0.0.0:0";
const DEFAULT_STATE_BIND: &str = "0.0.0.0:8890";
const DEFAULT_VIDEO_BIND: &str = "0.0.0.0:11111";
const DEFAULT_LINK_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONNECT_RETRY_MS: u64 = 1_000;
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
const DEFAULT_RELAY_QUEUE: usize = 256;
const DEFAULT_KEEPALIVE_MS: u64 = 250;
const DEFAULT_STATUS_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    frame: Option<FrameConfigFile>,
    link: Option<LinkConfigFile>,
    decoder: Option<DecoderConfigFile>,
    tracking: Option<TrackingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct FrameConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct LinkConfigFile {
    drone_addr: Option<String>,
    command_bind: Option<String>,
    state_bind: Option<String>,
    video_bind: Option<String>,
    timeout_secs: Option<u64>,
    connect_retry_ms: Option<u64>,
    keepalive_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DecoderConfigFile {
    ffmpeg_path: Option<PathBuf>,
    relay_queue: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackingConfigFile {
    rebaseline_after_lost_frames: Option<u32>,
    status_interval_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub frame: FrameGeometry,
    pub link: LinkSettings,
    pub decoder: DecoderSettings,
    pub keepalive_interval: Duration,
    pub rebaseline_after_lost_frames: Option<u32>,
    pub status_interval: Duration,
}

/// UDP endpoints of the Tello text SDK.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub drone_addr: String,
    pub command_bind: String,
    pub state_bind: String,
    pub video_bind: String,
    /// Silence longer than this after connecting is a link failure.
    pub timeout: Duration,
    /// Interval between handshake attempts while unconnected.
    pub connect_retry: Duration,
}

#[derive(Debug, Clone)]
pub struct DecoderSettings {
    pub ffmpeg_path: PathBuf,
    /// Video packets buffered between the lifecycle handler and the decoder.
    pub relay_queue: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from_file(TrackerConfigFile::default())
    }
}

impl TrackerConfig {
    /// Load from the JSON file named by `TRACKER_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TRACKER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TrackerConfigFile) -> Self {
        let frame = FrameGeometry::new(
            file.frame
                .as_ref()
                .and_then(|frame| frame.width)
                .unwrap_or(DEFAULT_FRAME_WIDTH),
            file.frame
                .as_ref()
                .and_then(|frame| frame.height)
                .unwrap_or(DEFAULT_FRAME_HEIGHT),
        );
        let link_file = file.link.unwrap_or_default();
        let link = LinkSettings {
            drone_addr: link_file
                .drone_addr
                .unwrap_or_else(|| DEFAULT_DRONE_ADDR.to_string()),
            command_bind: link_file
                .command_bind
                .unwrap_or_else(|| DEFAULT_COMMAND_BIND.to_string()),
            state_bind: link_file
                .state_bind
                .unwrap_or_else(|| DEFAULT_STATE_BIND.to_string()),
            video_bind: link_file
                .video_bind
                .unwrap_or_else(|| DEFAULT_VIDEO_BIND.to_string()),
            timeout: Duration::from_secs(
                link_file.timeout_secs.unwrap_or(DEFAULT_LINK_TIMEOUT_SECS),
            ),
            connect_retry: Duration::from_millis(
                link_file
                    .connect_retry_ms
                    .unwrap_or(DEFAULT_CONNECT_RETRY_MS),
            ),
        };
        let keepalive_interval =
            Duration::from_millis(link_file.keepalive_ms.unwrap_or(DEFAULT_KEEPALIVE_MS));
        let decoder = DecoderSettings {
            ffmpeg_path: file
                .decoder
                .as_ref()
                .and_then(|decoder| decoder.ffmpeg_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG_PATH)),
            relay_queue: file
                .decoder
                .as_ref()
                .and_then(|decoder| decoder.relay_queue)
                .unwrap_or(DEFAULT_RELAY_QUEUE),
        };
        let rebaseline_after_lost_frames = file
            .tracking
            .as_ref()
            .and_then(|tracking| tracking.rebaseline_after_lost_frames);
        let status_interval = Duration::from_secs(
            file.tracking
                .and_then(|tracking| tracking.status_interval_secs)
                .unwrap_or(DEFAULT_STATUS_INTERVAL_SECS),
        );
        Self {
            frame,
            link,
            decoder,
            keepalive_interval,
            rebaseline_after_lost_frames,
            status_interval,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("TELLO_ADDR") {
            if !addr.trim().is_empty() {
                self.link.drone_addr = addr.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("TRACKER_FFMPEG") {
            if !path.trim().is_empty() {
                self.decoder.ffmpeg_path = PathBuf::from(path);
            }
        }
        if let Ok(keepalive) = std::env::var("TRACKER_KEEPALIVE_MS") {
            let millis: u64 = keepalive.trim().parse().map_err(|_| {
                anyhow!("TRACKER_KEEPALIVE_MS must be an integer number of milliseconds")
            })?;
            self.keepalive_interval = Duration::from_millis(millis);
        }
        if let Ok(frames) = std::env::var("TRACKER_REBASELINE_AFTER") {
            let frames = frames.trim();
            self.rebaseline_after_lost_frames = if frames.is_empty() || frames == "never" {
                None
            } else {
                Some(frames.parse().map_err(|_| {
                    anyhow!("TRACKER_REBASELINE_AFTER must be a frame count or 'never'")
                })?)
            };
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(anyhow!("frame dimensions must be greater than zero"));
        }
        self.link
            .drone_addr
            .parse::<SocketAddr>()
            .map_err(|_| anyhow!("invalid drone address '{}'", self.link.drone_addr))?;
        for (name, addr) in [
            ("command_bind", &self.link.command_bind),
            ("state_bind", &self.link.state_bind),
            ("video_bind", &self.link.video_bind),
        ] {
            addr.parse::<SocketAddr>()
                .map_err(|_| anyhow!("invalid {} address '{}'", name, addr))?;
        }
        if self.link.timeout.is_zero() {
            return Err(anyhow!("link timeout must be greater than zero"));
        }
        if self.link.connect_retry.is_zero() {
            return Err(anyhow!("connect retry interval must be greater than zero"));
        }
        if self.keepalive_interval.is_zero() {
            return Err(anyhow!("video keep-alive interval must be greater than zero"));
        }
        if self.decoder.relay_queue == 0 {
            return Err(anyhow!("relay queue must hold at least one packet"));
        }
        if self.rebaseline_after_lost_frames == Some(0) {
            self.rebaseline_after_lost_frames = None;
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<TrackerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
