//! H.264 → BGR24 decoding through an `ffmpeg` child process.
//!
//! Encoded packets are written to the child's stdin by the video relay; raw
//! frames of a fixed size are read from its stdout by the tracking loop.

use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use anyhow::{anyhow, Context, Result};

use super::pipe::PipeFrameSource;
use crate::tracking::FrameGeometry;

/// Running decoder process. Killed on drop.
pub struct FfmpegDecoder {
    child: Child,
}

impl FfmpegDecoder {
    /// Spawn the decoder and hand back its input and output ends.
    pub fn spawn(
        ffmpeg_path: &Path,
        geometry: FrameGeometry,
    ) -> Result<(Self, ChildStdin, PipeFrameSource<ChildStdout>)> {
        let mut child = Command::new(ffmpeg_path)
            .args(decoder_args(geometry))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start decoder {}", ffmpeg_path.display()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("decoder stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("decoder stdout unavailable"))?;
        let source = PipeFrameSource::new(stdout, geometry)?;
        log::info!(
            "decoder started (pid {}, {}x{} bgr24)",
            child.id(),
            geometry.width,
            geometry.height
        );
        Ok((Self { child }, stdin, source))
    }

    /// Terminate the process. Safe to call more than once.
    pub fn kill(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                log::debug!("decoder already exited: {}", status);
                return;
            }
            Ok(None) => {}
            Err(err) => log::warn!("decoder status unavailable: {}", err),
        }
        if let Err(err) = self.child.kill() {
            log::warn!("failed to stop decoder: {}", err);
        }
        let _ = self.child.wait();
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Command line for a stdin → raw BGR24 stdout decode at a fixed size.
pub fn decoder_args(geometry: FrameGeometry) -> Vec<String> {
    vec![
        "-hwaccel".to_string(),
        "auto".to_string(),
        "-i".to_string(),
        "pipe:0".to_string(),
        "-pix_fmt".to_string(),
        "bgr24".to_string(),
        "-s".to_string(),
        format!("{}x{}", geometry.width, geometry.height),
        "-f".to_string(),
        "rawvideo".to_string(),
        "pipe:1".to_string(),
    ]
}
