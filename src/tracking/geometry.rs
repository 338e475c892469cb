/// Fraction of the frame diagonal used as the distance tolerance.
pub const TOLERANCE_FRACTION: f64 = 0.02;

/// Pixel dimensions of the decoded video.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn diagonal(&self) -> f64 {
        distance(0.0, 0.0, self.width as f32, self.height as f32)
    }

    /// Dead-band unit for calibration gating and depth control.
    pub fn distance_tolerance(&self) -> f64 {
        TOLERANCE_FRACTION * self.diagonal()
    }
}

/// Pixel-space box, clamped to the frame it came from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Diagonal length, used as a proxy for apparent subject distance.
    pub fn diagonal(&self) -> f64 {
        distance(self.left, self.top, self.right, self.bottom)
    }
}

fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f64 {
    let dx = (x2 - x1) as f64;
    let dy = (y2 - y1) as f64;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_is_two_percent_of_diagonal() {
        let geometry = FrameGeometry::new(600, 800);
        assert_eq!(geometry.diagonal(), 1000.0);
        assert!((geometry.distance_tolerance() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn box_diagonal_is_euclidean() {
        let bbox = BoundingBox::new(210.0, 280.0, 390.0, 520.0);
        assert_eq!(bbox.diagonal(), 300.0);
    }
}
