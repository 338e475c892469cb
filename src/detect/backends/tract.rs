#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::model::ModelDefinition;
use crate::detect::result::{DetectionResult, RawDetection};

/// Tract-based backend for ONNX inference.
///
/// Loads the network once and runs it on BGR24 frames resized to the model's
/// input with nearest-neighbour sampling. No network I/O, no disk writes after
/// loading.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    definition: ModelDefinition,
}

impl TractBackend {
    /// Load ONNX weights from disk and prepare them for inference.
    pub fn new<P: AsRef<Path>>(weights_path: P, definition: ModelDefinition) -> Result<Self> {
        let weights_path = weights_path.as_ref();
        let height = definition.input_height as usize;
        let width = definition.input_width as usize;
        let model = tract_onnx::onnx()
            .model_for_path(weights_path)
            .with_context(|| {
                format!("failed to load ONNX model from {}", weights_path.display())
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, height, width)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, definition })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} BGR bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let def = &self.definition;
        let (src_w, src_h) = (width as usize, height as usize);
        let (dst_w, dst_h) = (def.input_width as usize, def.input_height as usize);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, dst_h, dst_w),
            |(_, channel, y, x)| {
                let sx = x * src_w / dst_w;
                let sy = y * src_h / dst_h;
                let source_channel = if def.swap_rb { 2 - channel } else { channel };
                let idx = (sy * src_w + sx) * 3 + source_channel;
                (pixels[idx] as f32 - def.mean[channel]) * def.scale
            },
        );

        Ok(input.into_tensor())
    }

    fn extract_detections(&self, outputs: TVec<TValue>) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let values: Vec<f32> = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .iter()
            .copied()
            .collect();

        let layout = &self.definition.output;
        let detections = values
            .chunks_exact(layout.row_len)
            .filter_map(|row| {
                let confidence = row[layout.confidence_index];
                let b = &row[layout.box_index..layout.box_index + 4];
                if !confidence.is_finite() || b.iter().any(|v| !v.is_finite()) {
                    return None;
                }
                Some(RawDetection::new(confidence, b[0], b[1], b[2], b[3]))
            })
            .collect();
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        Ok(DetectionResult::new(self.extract_detections(outputs)?))
    }

    fn warm_up(&mut self) -> Result<()> {
        let def = &self.definition;
        let blank = vec![0u8; def.input_width as usize * def.input_height as usize * 3];
        let (w, h) = (def.input_width, def.input_height);
        self.detect(&blank, w, h).map(|_| ())
    }
}
