//! Decoded frame container and the frame-source contract.
//!
//! - `Frame`: one BGR24 pixel buffer of exactly `width * height * 3` bytes.
//! - `FrameSource`: blocking producer of frames (the decoder output).
//! - `FrameReadError`: distinguishes a transient short read from a dead stream.
//!
//! Frames are owned by a single tracking-loop iteration and dropped at its end.

use anyhow::{anyhow, Result};

use crate::tracking::FrameGeometry;

/// Bytes per BGR24 pixel.
pub const BYTES_PER_PIXEL: usize = 3;

/// One decoded BGR24 frame.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap a decoded buffer. The length must match the dimensions exactly.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = frame_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "BGR frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.width, self.height)
    }
}

/// Size in bytes of a BGR24 frame, with overflow checks.
pub fn frame_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

/// Why a frame could not be produced.
#[derive(Debug)]
pub enum FrameReadError {
    /// The stream ended part-way through a frame. Transient: skip and retry.
    Partial { expected: usize, received: usize },
    /// The stream ended on a frame boundary.
    Closed,
    /// The underlying reader failed.
    Io(std::io::Error),
}

impl FrameReadError {
    /// Whether the tracking loop may keep reading after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, FrameReadError::Partial { .. })
    }
}

impl std::fmt::Display for FrameReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameReadError::Partial { expected, received } => write!(
                f,
                "partial frame read: expected {} bytes, received {}",
                expected, received
            ),
            FrameReadError::Closed => write!(f, "frame stream closed"),
            FrameReadError::Io(err) => write!(f, "frame stream read failed: {}", err),
        }
    }
}

impl std::error::Error for FrameReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameReadError::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Blocking producer of fixed-size decoded frames.
pub trait FrameSource: Send {
    /// Frame dimensions every produced frame will have.
    fn geometry(&self) -> FrameGeometry;

    /// Block until one full frame is available.
    fn next_frame(&mut self) -> std::result::Result<Frame, FrameReadError>;
}
