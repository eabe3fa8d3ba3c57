use crate::error::StrategyResult;
use crate::sim::types::{EnergyManagementState, SystemState};

use super::{OperationStrategy, Priority, charge_limit_kw, discharge_limit_kw};

/// Steers the state of charge toward a fixed target within one step where
/// the power limits allow it.
#[derive(Debug)]
pub struct SocMaintenance {
    target_soc: f64,
}

impl SocMaintenance {
    /// `target_soc` is clamped to `[0, 1]`.
    pub fn new(target_soc: f64) -> Self {
        Self {
            target_soc: target_soc.clamp(0.0, 1.0),
        }
    }

    pub fn target_soc(&self) -> f64 {
        self.target_soc
    }
}

impl OperationStrategy for SocMaintenance {
    fn name(&self) -> &str {
        "soc_maintenance"
    }

    fn priority(&self) -> Priority {
        Priority::Low
    }

    fn next(&mut self, _time_s: f64, state: &SystemState, _request_kw: f64) -> StrategyResult<f64> {
        let delta_kwh = (self.target_soc - state.soc) * state.capacity_kwh;
        Ok((delta_kwh / state.dt_hours).clamp(-discharge_limit_kw(state), charge_limit_kw(state)))
    }

    fn update(&mut self, _ems: &EnergyManagementState) -> StrategyResult<()> {
        Ok(())
    }

    fn clear(&mut self) -> StrategyResult<()> {
        Ok(())
    }

    fn close(&mut self) -> StrategyResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testing::state;

    #[test]
    fn moves_toward_target() {
        let mut s = SocMaintenance::new(0.5);
        // 0.1 * 10 kWh over 0.25 h
        assert!((s.next(0.0, &state(0.4), 0.0).expect("next") - 4.0).abs() < 1e-9);
        assert_eq!(s.next(0.0, &state(0.1), 0.0), Ok(5.0));
        assert!(s.next(0.0, &state(0.8), 0.0).expect("next") < 0.0);
        assert_eq!(s.next(0.0, &state(0.5), 0.0), Ok(0.0));
    }

    #[test]
    fn target_is_clamped() {
        assert_eq!(SocMaintenance::new(1.7).target_soc(), 1.0);
    }
}
