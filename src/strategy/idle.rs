use crate::error::StrategyResult;
use crate::sim::types::{EnergyManagementState, SystemState};

use super::{OperationStrategy, Priority};

/// Never dispatches the storage.
#[derive(Debug, Default)]
pub struct IdleStrategy;

impl OperationStrategy for IdleStrategy {
    fn name(&self) -> &str {
        "idle"
    }

    fn priority(&self) -> Priority {
        Priority::Low
    }

    fn next(&mut self, _time_s: f64, _state: &SystemState, _request_kw: f64) -> StrategyResult<f64> {
        Ok(0.0)
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
