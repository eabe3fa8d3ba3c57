//! Physical sub-models advancing one quantity per timestep.

pub mod constants;
pub mod controller;
pub mod pressure;

pub use controller::{PressureController, ProportionalValve};
pub use pressure::{ElectrolyzerPressureModel, PressureParams};

use crate::error::PhysicsResult;

use self::constants::AMBIENT_PRESSURE_BAR;

/// Electrolyzer operating point for the step ending at the next `calculate` time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HydrogenState {
    /// Timestamp of the previous step, s.
    pub time_s: f64,
    /// Stack current, A.
    pub current_a: f64,
    /// Cells in series in the stack.
    pub cell_count: u32,
    /// Stack temperature, K.
    pub temperature_k: f64,
}

/// Last integrated pressures and flows of the electrolyzer gas compartments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureState {
    /// Time this state belongs to, s.
    pub time_s: f64,
    /// H2 side pressure, bar (absolute).
    pub cathode_pressure_bar: f64,
    /// O2 side pressure, bar (absolute).
    pub anode_pressure_bar: f64,
    /// H2 produced by the stack during the last step, mol.
    pub h2_produced_mol: f64,
    /// H2 released through the control valve during the last step, mol.
    pub h2_released_mol: f64,
    /// H2 valve outflow, mol/s.
    pub h2_outflow_mol_per_s: f64,
    /// O2 valve outflow, mol/s.
    pub o2_outflow_mol_per_s: f64,
}

impl PressureState {
    pub fn ambient(time_s: f64) -> Self {
        Self {
            time_s,
            cathode_pressure_bar: AMBIENT_PRESSURE_BAR,
            anode_pressure_bar: AMBIENT_PRESSURE_BAR,
            h2_produced_mol: 0.0,
            h2_released_mol: 0.0,
            h2_outflow_mol_per_s: 0.0,
            o2_outflow_mol_per_s: 0.0,
        }
    }
}

/// A numerical integrator for a pressure quantity.
pub trait PressureModel: Send {
    /// Advances the model to `time_s` from the operating point in `state`.
    ///
    /// # Errors
    ///
    /// Fails with `PhysicsError::NonPositiveTimestep` when
    /// `time_s - state.time_s <= 0`, and with other `PhysicsError`s when the
    /// controller or the integration leave their valid range.
    fn calculate(&mut self, time_s: f64, state: &HydrogenState) -> PhysicsResult<PressureState>;

    /// Returns the last integrated state.
    fn state(&self) -> &PressureState;

    /// Ends the integration; later `calculate` calls fail.
    fn close(&mut self) -> PhysicsResult<()>;
}
