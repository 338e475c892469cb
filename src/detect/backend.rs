use anyhow::Result;

use super::result::DetectionResult;

/// Detector backend trait.
///
/// One call = one inference over one BGR24 frame. Backends keep no state
/// between calls that affects results; the pixel slice is only borrowed for
/// the duration of the call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult>;

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
