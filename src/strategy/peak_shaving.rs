//! Peak shaving against a fixed grid-import threshold.

use crate::error::StrategyResult;
use crate::sim::types::{EnergyManagementState, SystemState};

use super::{OperationStrategy, Priority, charge_limit_kw, discharge_limit_kw};

/// Tolerance for counting a step as shaved, kW.
const SHAVE_TOLERANCE_KW: f64 = 1e-6;

/// Discharges the part of the power request above `threshold_kw` and
/// recharges with the margin left below it.
#[derive(Debug)]
pub struct PeakShaving {
    threshold_kw: f64,
    /// Whether the current candidate targets a peak.
    pending_peak: Option<bool>,
    peak_import_kw: f64,
    shaved_steps: usize,
    missed_steps: usize,
}

impl PeakShaving {
    pub fn new(threshold_kw: f64) -> Self {
        Self {
            threshold_kw,
            pending_peak: None,
            peak_import_kw: 0.0,
            shaved_steps: 0,
            missed_steps: 0,
        }
    }

    /// Highest grid import seen in committed steps, kW.
    pub fn peak_import_kw(&self) -> f64 {
        self.peak_import_kw
    }

    /// Committed peak steps that stayed at or below the threshold.
    pub fn shaved_steps(&self) -> usize {
        self.shaved_steps
    }

    /// Committed peak steps that still exceeded the threshold.
    pub fn missed_steps(&self) -> usize {
        self.missed_steps
    }
}

impl OperationStrategy for PeakShaving {
    fn name(&self) -> &str {
        "peak_shaving"
    }

    fn priority(&self) -> Priority {
        Priority::High
    }

    fn next(&mut self, _time_s: f64, state: &SystemState, power_request_kw: f64) -> StrategyResult<f64> {
        let excess_kw = power_request_kw - self.threshold_kw;
        let setpoint = if excess_kw > 0.0 {
            -excess_kw.min(discharge_limit_kw(state))
        } else {
            (-excess_kw).min(charge_limit_kw(state))
        };
        self.pending_peak = Some(excess_kw > 0.0);
        Ok(setpoint)
    }

    fn update(&mut self, ems: &EnergyManagementState) -> StrategyResult<()> {
        let Some(peak) = self.pending_peak.take() else {
            return Ok(());
        };
        self.peak_import_kw = self.peak_import_kw.max(ems.grid_kw);
        if peak {
            if ems.grid_kw <= self.threshold_kw + SHAVE_TOLERANCE_KW {
                self.shaved_steps += 1;
            } else {
                self.missed_steps += 1;
            }
        }
        Ok(())
    }

    fn clear(&mut self) -> StrategyResult<()> {
        self.pending_peak = None;
        Ok(())
    }

    fn close(&mut self) -> StrategyResult<()> {
        self.pending_peak = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testing::{ems, state};

    #[test]
    fn shaves_excess_above_threshold() {
        let mut s = PeakShaving::new(3.0);
        assert_eq!(s.next(0.0, &state(0.5), 5.0), Ok(-2.0));
        assert_eq!(s.next(0.0, &state(0.5), 30.0), Ok(-5.0));
    }

    #[test]
    fn recharges_below_threshold() {
        let mut s = PeakShaving::new(3.0);
        assert_eq!(s.next(0.0, &state(0.5), 1.0), Ok(2.0));
        assert_eq!(s.next(0.0, &state(1.0), 1.0), Ok(0.0));
    }

    #[test]
    fn next_is_repeatable_and_leaves_history_alone() {
        let mut s = PeakShaving::new(3.0);
        let a = s.next(0.0, &state(0.5), 5.0);
        let b = s.next(0.0, &state(0.5), 5.0);
        assert_eq!(a, b);
        assert_eq!(s.peak_import_kw(), 0.0);
        assert_eq!(s.shaved_steps(), 0);
    }

    #[test]
    fn committed_peak_step_counts() {
        let mut s = PeakShaving::new(3.0);
        s.next(0.0, &state(0.5), 5.0).expect("next");
        let mut outcome = ems(900.0);
        outcome.grid_kw = 3.0;
        s.update(&outcome).expect("update");
        assert_eq!(s.shaved_steps(), 1);
        assert_eq!(s.peak_import_kw(), 3.0);

        s.next(0.0, &state(0.0), 5.0).expect("next");
        outcome.grid_kw = 5.0;
        s.update(&outcome).expect("update");
        assert_eq!(s.missed_steps(), 1);
        assert_eq!(s.peak_import_kw(), 5.0);
    }

    #[test]
    fn cleared_candidate_is_discarded() {
        let mut s = PeakShaving::new(3.0);
        s.next(0.0, &state(0.5), 5.0).expect("next");
        s.clear().expect("clear");
        let mut outcome = ems(900.0);
        outcome.grid_kw = 5.0;
        s.update(&outcome).expect("update");
        assert_eq!(s.missed_steps(), 0);
        assert_eq!(s.peak_import_kw(), 0.0);
    }
}
