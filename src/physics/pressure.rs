//! Electrolyzer gas-pressure integrator.

use crate::error::{PhysicsError, PhysicsResult};

use super::constants::{
    AMBIENT_PRESSURE_BAR, ELECTRONS_PER_H2, FARADAY_CONSTANT, IDEAL_GAS_CONSTANT, O2_PER_H2,
    PASCAL_PER_BAR, saturation_pressure_bar,
};
use super::controller::{PressureController, ProportionalValve};
use super::{HydrogenState, PressureModel, PressureState};

/// Fixed geometry and set-points of the electrolyzer gas separators.
#[derive(Debug, Clone, Copy)]
pub struct PressureParams {
    /// Cathode (H2) gas volume, m³.
    pub cathode_volume_m3: f64,
    /// Anode (O2) gas volume, m³.
    pub anode_volume_m3: f64,
    /// Cathode target pressure, bar (absolute).
    pub target_cathode_bar: f64,
    /// Anode target pressure, bar (absolute).
    pub target_anode_bar: f64,
}

impl Default for PressureParams {
    fn default() -> Self {
        Self {
            cathode_volume_m3: 0.5,
            anode_volume_m3: 0.5,
            target_cathode_bar: 30.0,
            target_anode_bar: 2.0,
        }
    }
}

/// Ideal-gas pressure model for the two gas compartments of an electrolyzer.
///
/// Each step, gas produced by the stack accumulates in a fixed control
/// volume; a [`PressureController`] decides how much leaves through the
/// control valve. The net amount raises the pressure by
/// `R·T/V · Δn`, scaled by a water-vapor correction `1 + p_sat(T) / p`.
pub struct ElectrolyzerPressureModel<C: PressureController = ProportionalValve> {
    params: PressureParams,
    controller: C,
    state: PressureState,
    closed: bool,
}

impl<C: PressureController> ElectrolyzerPressureModel<C> {
    /// Creates a model at ambient pressure with timestamp `start_time_s`.
    ///
    /// # Errors
    ///
    /// Returns `PhysicsError::InvalidArg` for non-positive volumes or targets
    /// below ambient pressure.
    pub fn new(params: PressureParams, controller: C, start_time_s: f64) -> PhysicsResult<Self> {
        if !(params.cathode_volume_m3 > 0.0) || !(params.anode_volume_m3 > 0.0) {
            return Err(PhysicsError::InvalidArg {
                what: "gas volumes must be positive",
            });
        }
        if params.target_cathode_bar < AMBIENT_PRESSURE_BAR
            || params.target_anode_bar < AMBIENT_PRESSURE_BAR
        {
            return Err(PhysicsError::InvalidArg {
                what: "target pressures must be at least ambient",
            });
        }
        Ok(Self {
            params,
            controller,
            state: PressureState::ambient(start_time_s),
            closed: false,
        })
    }

    /// Advances one compartment; returns `(new_pressure_bar, released_mol)`.
    fn integrate(
        &self,
        produced_mol: f64,
        pressure_bar: f64,
        target_bar: f64,
        volume_m3: f64,
        temperature_k: f64,
        delta_s: f64,
    ) -> PhysicsResult<(f64, f64)> {
        let released = self
            .controller
            .release(produced_mol, pressure_bar, target_bar, delta_s);
        if !(0.0..=produced_mol).contains(&released) {
            return Err(PhysicsError::ControllerOutOfRange {
                released,
                produced: produced_mol,
            });
        }

        let humidity = 1.0 + saturation_pressure_bar(temperature_k) / pressure_bar;
        let delta_p_bar = IDEAL_GAS_CONSTANT * temperature_k / volume_m3
            * (produced_mol - released)
            * humidity
            / PASCAL_PER_BAR;
        let new_pressure = pressure_bar + delta_p_bar;
        if !new_pressure.is_finite() {
            return Err(PhysicsError::NonFinite { what: "pressure" });
        }
        Ok((new_pressure, released))
    }
}

impl<C: PressureController> PressureModel for ElectrolyzerPressureModel<C> {
    fn calculate(&mut self, time_s: f64, state: &HydrogenState) -> PhysicsResult<PressureState> {
        if self.closed {
            return Err(PhysicsError::InvalidArg {
                what: "pressure model is closed",
            });
        }
        let delta_s = time_s - state.time_s;
        if !(delta_s > 0.0) {
            return Err(PhysicsError::NonPositiveTimestep { delta_s });
        }
        if !(state.temperature_k > 0.0 && state.temperature_k.is_finite()) {
            return Err(PhysicsError::InvalidArg {
                what: "temperature must be positive and finite",
            });
        }
        if !state.current_a.is_finite() {
            return Err(PhysicsError::NonFinite { what: "current" });
        }

        let current_a = state.current_a.max(0.0);
        let h2_produced =
            current_a * f64::from(state.cell_count) / (ELECTRONS_PER_H2 * FARADAY_CONSTANT) * delta_s;
        if !h2_produced.is_finite() {
            return Err(PhysicsError::NonFinite { what: "production" });
        }
        let o2_produced = h2_produced * O2_PER_H2;

        let (cathode_bar, h2_released) = self.integrate(
            h2_produced,
            self.state.cathode_pressure_bar,
            self.params.target_cathode_bar,
            self.params.cathode_volume_m3,
            state.temperature_k,
            delta_s,
        )?;
        let (anode_bar, o2_released) = self.integrate(
            o2_produced,
            self.state.anode_pressure_bar,
            self.params.target_anode_bar,
            self.params.anode_volume_m3,
            state.temperature_k,
            delta_s,
        )?;

        let h2_outflow = h2_released / delta_s;
        let o2_outflow = o2_released / delta_s;
        if !h2_outflow.is_finite() || !o2_outflow.is_finite() {
            return Err(PhysicsError::NonFinite { what: "outflow" });
        }

        self.state = PressureState {
            time_s,
            cathode_pressure_bar: cathode_bar,
            anode_pressure_bar: anode_bar,
            h2_produced_mol: h2_produced,
            h2_released_mol: h2_released,
            h2_outflow_mol_per_s: h2_outflow,
            o2_outflow_mol_per_s: o2_outflow,
        };
        Ok(self.state)
    }

    fn state(&self) -> &PressureState {
        &self.state
    }

    fn close(&mut self) -> PhysicsResult<()> {
        self.closed = true;
        Ok(())
    }
}
