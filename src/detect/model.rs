use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

/// How to feed the network and read its output.
///
/// Defaults describe the res10 SSD face detector: a 128x96 BGR blob with the
/// mean (104, 177, 123) subtracted, and `detection_out` rows of
/// `[image_id, label, confidence, x1, y1, x2, y2]`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ModelDefinition {
    pub input_width: u32,
    pub input_height: u32,
    /// Per-channel mean, in blob channel order.
    pub mean: [f32; 3],
    pub scale: f32,
    /// Feed RGB instead of the decoder's BGR.
    pub swap_rb: bool,
    pub output: OutputLayout,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OutputLayout {
    pub row_len: usize,
    pub confidence_index: usize,
    /// Offset of `x1`; `y1, x2, y2` follow.
    pub box_index: usize,
}

impl Default for ModelDefinition {
    fn default() -> Self {
        Self {
            input_width: 128,
            input_height: 96,
            mean: [104.0, 177.0, 123.0],
            scale: 1.0,
            swap_rb: false,
            output: OutputLayout::default(),
        }
    }
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            row_len: 7,
            confidence_index: 2,
            box_index: 3,
        }
    }
}

impl ModelDefinition {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            anyhow!("failed to read model definition {}: {}", path.display(), e)
        })?;
        let definition: ModelDefinition = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid model definition {}: {}", path.display(), e))?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        if !self.scale.is_finite() || self.scale == 0.0 {
            return Err(anyhow!("model input scale must be finite and non-zero"));
        }
        let layout = &self.output;
        if layout.confidence_index >= layout.row_len {
            return Err(anyhow!(
                "confidence index {} outside row of {}",
                layout.confidence_index,
                layout.row_len
            ));
        }
        if layout.box_index + 4 > layout.row_len {
            return Err(anyhow!(
                "box at {} does not fit in row of {}",
                layout.box_index,
                layout.row_len
            ));
        }
        Ok(())
    }
}
