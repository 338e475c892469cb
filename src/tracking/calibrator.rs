use super::geometry::BoundingBox;

/// A baseline candidate must be at least this many tolerances across.
pub const BASELINE_MIN_TOLERANCES: f64 = 5.0;

/// Baseline captured from the first trustworthy detection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CalibrationState {
    pub established: bool,
    pub baseline_box: Option<BoundingBox>,
    pub baseline_distance: f64,
}

/// Result of offering a detection to the calibrator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CalibrationOutcome {
    Established { distance: f64 },
    Rejected { distance: f64, minimum: f64 },
    AlreadyEstablished,
}

/// One-shot baseline latch.
#[derive(Debug)]
pub struct Calibrator {
    tolerance: f64,
    state: CalibrationState,
}

impl Calibrator {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            state: CalibrationState::default(),
        }
    }

    /// Smallest diagonal accepted as a baseline.
    pub fn minimum_distance(&self) -> f64 {
        BASELINE_MIN_TOLERANCES * self.tolerance
    }

    /// Offer an accepted detection's box. Latches at most once.
    pub fn consider(&mut self, bbox: &BoundingBox) -> CalibrationOutcome {
        if self.state.established {
            return CalibrationOutcome::AlreadyEstablished;
        }
        let distance = bbox.diagonal();
        let minimum = self.minimum_distance();
        if distance < minimum {
            return CalibrationOutcome::Rejected { distance, minimum };
        }
        self.state = CalibrationState {
            established: true,
            baseline_box: Some(*bbox),
            baseline_distance: distance,
        };
        CalibrationOutcome::Established { distance }
    }

    pub fn is_established(&self) -> bool {
        self.state.established
    }

    pub fn baseline_distance(&self) -> Option<f64> {
        self.state
            .established
            .then_some(self.state.baseline_distance)
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    /// Forget the baseline. Only the re-baseline policy calls this.
    pub fn reset(&mut self) {
        self.state = CalibrationState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_box(side: f32) -> BoundingBox {
        BoundingBox::new(0.0, 0.0, side, side)
    }

    #[test]
    fn rejects_small_candidates_and_latches_once() {
        let mut calibrator = Calibrator::new(20.0);
        let small = BoundingBox::new(0.0, 0.0, 48.0, 64.0);
        assert_eq!(
            calibrator.consider(&small),
            CalibrationOutcome::Rejected {
                distance: 80.0,
                minimum: 100.0
            }
        );
        assert!(!calibrator.is_established());
        assert_eq!(calibrator.baseline_distance(), None);

        let good = BoundingBox::new(10.0, 10.0, 190.0, 250.0);
        assert_eq!(
            calibrator.consider(&good),
            CalibrationOutcome::Established { distance: 300.0 }
        );
        assert_eq!(calibrator.baseline_distance(), Some(300.0));
        assert_eq!(calibrator.state().baseline_box, Some(good));

        assert_eq!(
            calibrator.consider(&square_box(500.0)),
            CalibrationOutcome::AlreadyEstablished
        );
        assert_eq!(calibrator.baseline_distance(), Some(300.0));
    }

    #[test]
    fn boundary_diagonal_is_accepted() {
        let mut calibrator = Calibrator::new(20.0);
        let exact = BoundingBox::new(0.0, 0.0, 60.0, 80.0);
        assert_eq!(
            calibrator.consider(&exact),
            CalibrationOutcome::Established { distance: 100.0 }
        );
    }

    #[test]
    fn reset_clears_baseline() {
        let mut calibrator = Calibrator::new(1.0);
        calibrator.consider(&square_box(100.0));
        assert!(calibrator.is_established());
        calibrator.reset();
        assert!(!calibrator.is_established());
        assert_eq!(calibrator.state(), &CalibrationState::default());
    }
}
