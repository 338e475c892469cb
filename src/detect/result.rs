use crate::tracking::{BoundingBox, FrameGeometry};

/// Minimum confidence for a detection to influence calibration or control.
pub const ACCEPT_CONFIDENCE: f32 = 0.5;

/// Output of one inference call.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    /// Rows in detector order (proportional 0..1 coordinates).
    pub detections: Vec<RawDetection>,
}

impl DetectionResult {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self { detections }
    }

    /// Accepted detections scaled to the frame, in detector order.
    pub fn accepted(&self, geometry: FrameGeometry) -> impl Iterator<Item = Detection> + '_ {
        self.detections
            .iter()
            .map(move |raw| Detection::from_raw(raw, geometry))
            .filter(Detection::is_accepted)
    }

    /// The detection the controller acts on this frame.
    pub fn first_accepted(&self, geometry: FrameGeometry) -> Option<Detection> {
        self.accepted(geometry).next()
    }
}

/// One detector row: `[confidence, x1, y1, x2, y2]`, coordinates in 0..1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl RawDetection {
    pub fn new(confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            confidence,
            x1,
            y1,
            x2,
            y2,
        }
    }
}

/// A detection in pixel space, clamped to the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub frame_width: f32,
    pub frame_height: f32,
}

impl Detection {
    /// Build from pixel coordinates, clamping to `[0, dim - 1]`.
    pub fn new(
        confidence: f32,
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
        geometry: FrameGeometry,
    ) -> Self {
        let w = geometry.width as f32;
        let h = geometry.height as f32;
        Self {
            confidence,
            bbox: BoundingBox::new(
                clamp_axis(left, w),
                clamp_axis(top, h),
                clamp_axis(right, w),
                clamp_axis(bottom, h),
            ),
            frame_width: w,
            frame_height: h,
        }
    }

    pub fn from_raw(raw: &RawDetection, geometry: FrameGeometry) -> Self {
        let w = geometry.width as f32;
        let h = geometry.height as f32;
        Self::new(
            raw.confidence,
            raw.x1 * w,
            raw.y1 * h,
            raw.x2 * w,
            raw.y2 * h,
            geometry,
        )
    }

    pub fn is_accepted(&self) -> bool {
        self.confidence >= ACCEPT_CONFIDENCE
    }

    pub fn diagonal(&self) -> f64 {
        self.bbox.diagonal()
    }
}

fn clamp_axis(value: f32, extent: f32) -> f32 {
    let max = (extent - 1.0).max(0.0);
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max)
}
