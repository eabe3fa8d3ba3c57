/// Regulates how much gas leaves a vessel through its control valve.
pub trait PressureController: Send {
    /// Returns the amount (mol) released this step.
    ///
    /// Implementations must keep `0 <= released <= produced_mol`; the
    /// pressure model rejects anything else.
    fn release(&self, produced_mol: f64, pressure_bar: f64, target_bar: f64, delta_s: f64) -> f64;
}

/// Proportional back-pressure valve.
///
/// Closed below `target - band`, fully open at or above `target`, linear in
/// between. A fully open valve passes exactly what was produced, so the
/// vessel pressure holds once it reaches the target.
#[derive(Debug, Clone, Copy)]
pub struct ProportionalValve {
    /// Width of the proportional band below the target, bar.
    pub band_bar: f64,
}

impl ProportionalValve {
    /// # Panics
    ///
    /// Panics if `band_bar` is not strictly positive.
    pub fn new(band_bar: f64) -> Self {
        assert!(band_bar > 0.0, "band_bar must be > 0");
        Self { band_bar }
    }

    /// Valve opening in `[0, 1]`.
    pub fn opening(&self, pressure_bar: f64, target_bar: f64) -> f64 {
        ((pressure_bar - (target_bar - self.band_bar)) / self.band_bar).clamp(0.0, 1.0)
    }
}

impl Default for ProportionalValve {
    fn default() -> Self {
        Self { band_bar: 2.0 }
    }
}

impl PressureController for ProportionalValve {
    fn release(&self, produced_mol: f64, pressure_bar: f64, target_bar: f64, _delta_s: f64) -> f64 {
        if produced_mol <= 0.0 {
            return 0.0;
        }
        produced_mol * self.opening(pressure_bar, target_bar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_below_band() {
        let valve = ProportionalValve::new(2.0);
        assert_eq!(valve.release(1.0, 20.0, 30.0, 60.0), 0.0);
    }

    #[test]
    fn fully_open_at_target() {
        let valve = ProportionalValve::new(2.0);
        assert_eq!(valve.release(1.0, 30.0, 30.0, 60.0), 1.0);
        assert_eq!(valve.release(1.0, 35.0, 30.0, 60.0), 1.0);
    }

    #[test]
    fn linear_inside_band() {
        let valve = ProportionalValve::new(2.0);
        assert!((valve.release(1.0, 29.0, 30.0, 60.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn nothing_released_without_production() {
        let valve = ProportionalValve::default();
        assert_eq!(valve.release(0.0, 40.0, 30.0, 60.0), 0.0);
    }

    #[test]
    #[should_panic]
    fn zero_band_panics() {
        ProportionalValve::new(0.0);
    }
}
