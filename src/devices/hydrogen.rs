use crate::devices::types::{SECONDS_PER_HOUR, Storage};
use crate::error::{PhysicsError, SimResult};
use crate::physics::constants::{ELECTRONS_PER_H2, FARADAY_CONSTANT, HYDROGEN_LHV_KWH_PER_MOL};
use crate::physics::{HydrogenState, PressureModel, PressureState};
use crate::sim::types::SimConfig;

/// Electrical and thermal parameters of the hydrogen chain.
#[derive(Debug, Clone, Copy)]
pub struct HydrogenParams {
    /// Tank capacity on a lower-heating-value basis, kWh.
    pub capacity_kwh: f64,
    /// Initial tank fill fraction (0.0 to 1.0).
    pub initial_soc: f64,
    /// Electrolyzer rated power, kW.
    pub electrolyzer_max_kw: f64,
    /// Fuel cell rated power, kW.
    pub fuel_cell_max_kw: f64,
    /// Fuel cell electrical efficiency on LHV basis (0..1.0).
    pub fuel_cell_efficiency: f64,
    /// Electrolyzer cell voltage at rated operation, V.
    pub cell_voltage_v: f64,
    /// Electrolyzer cells in series.
    pub cell_count: u32,
    /// Stack temperature, K.
    pub stack_temperature_k: f64,
}

/// Electrolyzer, pressurized tank and fuel cell behind one power setpoint.
///
/// Positive setpoints run the electrolyzer; the gas it produces passes the
/// pressure model's control valve into the tank. Negative setpoints run the
/// fuel cell from the tank. The pressure model is advanced every step so its
/// timestamp never skips.
pub struct HydrogenStorage {
    params: HydrogenParams,
    capacity_mol: f64,
    tank_mol: f64,
    dt_hours: f64,
    last_time_s: f64,
    pressure: Box<dyn PressureModel>,
}

impl HydrogenStorage {
    /// # Panics
    ///
    /// Panics on non-positive capacity, ratings, voltage or cell count, or on
    /// an out-of-range initial fill or efficiency.
    pub fn new(params: HydrogenParams, pressure: Box<dyn PressureModel>, config: &SimConfig) -> Self {
        assert!(params.capacity_kwh > 0.0);
        assert!((0.0..=1.0).contains(&params.initial_soc));
        assert!(params.electrolyzer_max_kw >= 0.0 && params.fuel_cell_max_kw >= 0.0);
        assert!(params.fuel_cell_efficiency > 0.0 && params.fuel_cell_efficiency <= 1.0);
        assert!(params.cell_voltage_v > 0.0 && params.cell_count > 0);

        let capacity_mol = params.capacity_kwh / HYDROGEN_LHV_KWH_PER_MOL;
        let last_time_s = pressure.state().time_s;
        Self {
            params,
            capacity_mol,
            tank_mol: capacity_mol * params.initial_soc,
            dt_hours: config.dt_hours,
            last_time_s,
            pressure,
        }
    }

    /// Hydrogen stored in the tank, mol.
    pub fn tank_mol(&self) -> f64 {
        self.tank_mol
    }

    /// Stack current drawn for `power_kw` at rated cell voltage, A.
    fn stack_current_a(&self, power_kw: f64) -> f64 {
        power_kw * 1000.0 / (self.params.cell_voltage_v * f64::from(self.params.cell_count))
    }

    /// Largest electrolyzer power whose production fits in the tank headroom.
    fn headroom_limited_kw(&self) -> f64 {
        let headroom_mol = (self.capacity_mol - self.tank_mol).max(0.0);
        let dt_s = self.dt_hours * SECONDS_PER_HOUR;
        let max_current =
            headroom_mol * ELECTRONS_PER_H2 * FARADAY_CONSTANT / (f64::from(self.params.cell_count) * dt_s);
        max_current * self.params.cell_voltage_v * f64::from(self.params.cell_count) / 1000.0
    }
}

impl Storage for HydrogenStorage {
    fn dispatch(&mut self, time_s: f64, setpoint_kw: f64) -> SimResult<f64> {
        let electrolyzer_kw = if setpoint_kw > 0.0 {
            setpoint_kw
                .min(self.params.electrolyzer_max_kw)
                .min(self.headroom_limited_kw())
        } else {
            0.0
        };

        let operating_point = HydrogenState {
            time_s: self.last_time_s,
            current_a: self.stack_current_a(electrolyzer_kw),
            cell_count: self.params.cell_count,
            temperature_k: self.params.stack_temperature_k,
        };
        let gas = self.pressure.calculate(time_s, &operating_point)?;
        self.last_time_s = time_s;
        self.tank_mol = (self.tank_mol + gas.h2_released_mol).min(self.capacity_mol);

        if setpoint_kw >= 0.0 {
            return Ok(electrolyzer_kw);
        }

        let requested_kw = (-setpoint_kw).min(self.params.fuel_cell_max_kw);
        let mol_per_kw = self.dt_hours / (self.params.fuel_cell_efficiency * HYDROGEN_LHV_KWH_PER_MOL);
        let fuel_cell_kw = requested_kw.min(self.tank_mol / mol_per_kw);
        self.tank_mol = (self.tank_mol - fuel_cell_kw * mol_per_kw).max(0.0);
        if !self.tank_mol.is_finite() {
            return Err(PhysicsError::NonFinite { what: "tank inventory" }.into());
        }

        Ok(-fuel_cell_kw)
    }

    fn soc(&self) -> f64 {
        self.tank_mol / self.capacity_mol
    }

    fn capacity_kwh(&self) -> f64 {
        self.params.capacity_kwh
    }

    fn max_charge_kw(&self) -> f64 {
        self.params.electrolyzer_max_kw
    }

    fn max_discharge_kw(&self) -> f64 {
        self.params.fuel_cell_max_kw
    }

    fn technology(&self) -> &'static str {
        "Hydrogen"
    }

    fn pressure(&self) -> Option<PressureState> {
        Some(*self.pressure.state())
    }

    fn close(&mut self) -> SimResult<()> {
        self.pressure.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use crate::physics::{ElectrolyzerPressureModel, PressureParams, ProportionalValve};

    fn params(initial_soc: f64) -> HydrogenParams {
        HydrogenParams {
            capacity_kwh: 20.0,
            initial_soc,
            electrolyzer_max_kw: 5.0,
            fuel_cell_max_kw: 3.0,
            fuel_cell_efficiency: 0.5,
            cell_voltage_v: 1.8,
            cell_count: 20,
            stack_temperature_k: 353.15,
        }
    }

    fn storage(initial_soc: f64) -> HydrogenStorage {
        let model =
            ElectrolyzerPressureModel::new(PressureParams::default(), ProportionalValve::default(), 0.0)
                .expect("default params are valid");
        HydrogenStorage::new(params(initial_soc), Box::new(model), &SimConfig::new(900, 1, 0))
    }

    #[test]
    fn electrolysis_draws_power_and_raises_pressure() {
        let mut h2 = storage(0.0);
        let kw = h2.dispatch(900.0, 10.0).expect("valid step");
        assert_eq!(kw, 5.0);
        let p = h2.pressure().expect("hydrogen has a pressure model");
        assert!(p.cathode_pressure_bar > 1.1);
        assert_eq!(p.time_s, 900.0);
    }

    #[test]
    fn fuel_cell_limited_by_rating_and_tank() {
        let mut full = storage(0.5);
        assert_eq!(full.dispatch(900.0, -10.0).expect("valid step"), -3.0);

        let mut empty = storage(0.0);
        assert_eq!(empty.dispatch(900.0, -10.0).expect("valid step"), 0.0);
    }

    #[test]
    fn idle_steps_still_advance_pressure_clock() {
        let mut h2 = storage(0.5);
        h2.dispatch(900.0, 0.0).expect("valid step");
        h2.dispatch(1800.0, 0.0).expect("valid step");
        assert_eq!(h2.pressure().map(|p| p.time_s), Some(1800.0));
    }

    #[test]
    fn repeated_timestamp_fails_with_physics_error() {
        let mut h2 = storage(0.5);
        h2.dispatch(900.0, 1.0).expect("valid step");
        let err = h2.dispatch(900.0, 1.0);
        assert!(matches!(err, Err(SimError::Physics(PhysicsError::NonPositiveTimestep { .. }))));
    }

    #[test]
    fn closed_storage_rejects_dispatch() {
        let mut h2 = storage(0.5);
        h2.close().expect("close");
        assert!(h2.dispatch(900.0, 1.0).is_err());
    }

    #[test]
    fn full_tank_stops_electrolysis() {
        let mut h2 = storage(1.0);
        assert_eq!(h2.dispatch(900.0, 5.0).expect("valid step"), 0.0);
    }
}
