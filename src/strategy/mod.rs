//! Operation strategies and the per-step dispatch protocol.
//!
//! A strategy proposes a storage setpoint for the current step (`next`),
//! then learns whether it was used: `update` delivers the realized outcome,
//! `clear` discards a candidate that lost the selection. Composite strategies
//! nest other strategies and pick one candidate per step.

pub mod composite;
pub mod idle;
pub mod node;
pub mod peak_shaving;
pub mod pv_greedy;
pub mod soc_maintenance;

pub use composite::{CompositeStrategy, SelectionRule};
pub use idle::IdleStrategy;
pub use node::{Phase, StrategyNode};
pub use peak_shaving::PeakShaving;
pub use pv_greedy::PvGreedy;
pub use soc_maintenance::SocMaintenance;

use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;
use crate::error::StrategyResult;
use crate::sim::types::{EnergyManagementState, SystemState};

/// Priority tier used by stacked composites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    VeryHigh,
}

/// Step counters of one strategy node, keyed by its path in the tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyReport {
    /// Slash-separated names from the root, e.g. `stacked/peak_shaving`.
    pub path: String,
    pub priority: Priority,
    pub committed_steps: usize,
    pub cleared_steps: usize,
}

/// A pluggable decision unit producing one storage setpoint per step.
///
/// Setpoints follow the feeder convention: positive charges the storage,
/// negative discharges it. Implementations are driven through a
/// [`StrategyNode`], which rejects out-of-order calls.
pub trait OperationStrategy: Send {
    fn name(&self) -> &str;

    fn priority(&self) -> Priority;

    /// Proposes a setpoint for the step ending at `time_s`.
    ///
    /// Must not change anything `update` or `report` observe; calling it
    /// twice with identical arguments yields the same candidate.
    fn next(
        &mut self,
        time_s: f64,
        state: &SystemState,
        power_request_kw: f64,
    ) -> StrategyResult<f64>;

    /// Persists the realized outcome of the step.
    fn update(&mut self, ems: &EnergyManagementState) -> StrategyResult<()>;

    /// Discards the candidate of the current step.
    fn clear(&mut self) -> StrategyResult<()>;

    /// Ends the run.
    fn close(&mut self) -> StrategyResult<()>;

    /// Appends counters of nested nodes under `path`.
    fn report(&self, _path: &str, _out: &mut Vec<StrategyReport>) {}
}

/// Builds a strategy tree from its configuration.
///
/// # Errors
///
/// Returns `StrategyError::InvalidComposite` for composites with invalid
/// windows or no children.
pub fn build(config: &StrategyConfig) -> StrategyResult<Box<dyn OperationStrategy>> {
    Ok(match config {
        StrategyConfig::Idle => Box::new(IdleStrategy::default()),
        StrategyConfig::PvGreedy => Box::new(PvGreedy::new()),
        StrategyConfig::PeakShaving { threshold_kw } => Box::new(PeakShaving::new(*threshold_kw)),
        StrategyConfig::SocMaintenance { target_soc } => {
            Box::new(SocMaintenance::new(*target_soc))
        }
        StrategyConfig::Serial {
            start_hour,
            end_hour,
            in_window,
            outside_window,
        } => Box::new(CompositeStrategy::serial(
            "serial",
            *start_hour,
            *end_hour,
            build(in_window)?,
            build(outside_window)?,
        )?),
        StrategyConfig::Stacked { children } => {
            let children = children.iter().map(build).collect::<StrategyResult<Vec<_>>>()?;
            Box::new(CompositeStrategy::stacked("stacked", children)?)
        }
    })
}

/// Available energy and headroom bounds shared by the leaf strategies.
pub(crate) fn charge_limit_kw(state: &SystemState) -> f64 {
    let headroom_kwh = (1.0 - state.soc).max(0.0) * state.capacity_kwh;
    state.max_charge_kw.min(headroom_kwh / state.dt_hours)
}

pub(crate) fn discharge_limit_kw(state: &SystemState) -> f64 {
    let available_kwh = state.soc.max(0.0) * state.capacity_kwh;
    state.max_discharge_kw.min(available_kwh / state.dt_hours)
}
