//! Self-consumption strategy: absorb PV surplus, cover deficits.

use crate::error::StrategyResult;
use crate::sim::types::{EnergyManagementState, SystemState};

use super::{OperationStrategy, Priority, charge_limit_kw, discharge_limit_kw};

/// Charges from any surplus and discharges into any deficit, within the
/// storage power and energy limits.
#[derive(Debug, Default)]
pub struct PvGreedy {
    /// Candidate of the current step, until committed or cleared.
    pending_kw: Option<f64>,
    charged_kwh: f64,
    discharged_kwh: f64,
}

impl PvGreedy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Energy moved into the storage while this strategy was in charge, kWh.
    pub fn charged_kwh(&self) -> f64 {
        self.charged_kwh
    }

    /// Energy drawn from the storage while this strategy was in charge, kWh.
    pub fn discharged_kwh(&self) -> f64 {
        self.discharged_kwh
    }
}

impl OperationStrategy for PvGreedy {
    fn name(&self) -> &str {
        "pv_greedy"
    }

    fn priority(&self) -> Priority {
        Priority::Medium
    }

    fn next(&mut self, _time_s: f64, state: &SystemState, power_request_kw: f64) -> StrategyResult<f64> {
        let setpoint = (-power_request_kw).clamp(-discharge_limit_kw(state), charge_limit_kw(state));
        self.pending_kw = Some(setpoint);
        Ok(setpoint)
    }

    fn update(&mut self, ems: &EnergyManagementState) -> StrategyResult<()> {
        // Cleared candidates leave no trace.
        if self.pending_kw.take().is_none() {
            return Ok(());
        }
        let energy_kwh = ems.storage_kw * ems.dt_hours;
        if energy_kwh > 0.0 {
            self.charged_kwh += energy_kwh;
        } else {
            self.discharged_kwh -= energy_kwh;
        }
        Ok(())
    }

    fn clear(&mut self) -> StrategyResult<()> {
        self.pending_kw = None;
        Ok(())
    }

    fn close(&mut self) -> StrategyResult<()> {
        self.pending_kw = None;
        Ok(())
    }
}
