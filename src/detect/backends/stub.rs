use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{DetectionResult, RawDetection};

/// Stub backend for dry runs and tests.
///
/// Returns scripted results in order, one per call, then nothing.
#[derive(Debug, Default)]
pub struct StubBackend {
    script: VecDeque<Vec<RawDetection>>,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Vec<RawDetection>>,
    {
        Self {
            script: frames.into_iter().collect(),
            calls: 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<DetectionResult> {
        self.calls += 1;
        Ok(DetectionResult::new(
            self.script.pop_front().unwrap_or_default(),
        ))
    }
}
