use crate::devices::types::Storage;
use crate::error::SimResult;
use crate::sim::types::SimConfig;

/// A lithium-ion battery that can charge and discharge electricity.
///
/// `Battery` models a battery with configurable capacity, charge/discharge rates,
/// and efficiencies. It maintains its state of charge (SOC) and enforces operational
/// constraints when given power setpoints.
///
/// # Power Flow Convention (Feeder)
/// - Positive power: Charging (consuming power from the grid / load)
/// - Negative power: Discharging (supplying power to the grid / generation)
#[derive(Debug, Clone)]
pub struct Battery {
    /// Battery capacity in kilowatt-hours.
    pub capacity_kwh: f64,

    /// State of charge as a fraction (0.0 to 1.0).
    pub soc: f64,

    /// Maximum charge power in kilowatts (positive value).
    pub max_charge_kw: f64,

    /// Maximum discharge power in kilowatts (positive value).
    pub max_discharge_kw: f64,

    /// Charging efficiency (0..1.0).
    pub eta_c: f64,

    /// Discharging efficiency (0..1.0).
    pub eta_d: f64,

    /// Duration of one timestep in hours.
    dt_hours: f64,
}

impl Battery {
    /// Creates a new battery with the specified parameters.
    ///
    /// # Arguments
    ///
    /// * `capacity_kwh` - Battery capacity in kWh (must be > 0)
    /// * `soc` - Initial state of charge as a fraction (0.0 to 1.0)
    /// * `max_charge_kw` - Maximum charging power in kW
    /// * `max_discharge_kw` - Maximum discharging power in kW
    /// * `eta_c` - Charging efficiency (0..1.0)
    /// * `eta_d` - Discharging efficiency (0..1.0)
    /// * `config` - Simulation configuration for timing
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero/negative, SOC out of range, or efficiencies invalid.
    pub fn new(
        capacity_kwh: f64,
        soc: f64,
        max_charge_kw: f64,
        max_discharge_kw: f64,
        eta_c: f64,
        eta_d: f64,
        config: &SimConfig,
    ) -> Self {
        assert!(capacity_kwh > 0.0);
        assert!((0.0..=1.0).contains(&soc));
        assert!(max_charge_kw >= 0.0 && max_discharge_kw >= 0.0);
        assert!(eta_c > 0.0 && eta_c <= 1.0);
        assert!(eta_d > 0.0 && eta_d <= 1.0);

        Self {
            capacity_kwh,
            soc,
            max_charge_kw,
            max_discharge_kw,
            eta_c,
            eta_d,
            dt_hours: config.dt_hours,
        }
    }

    /// Charge power the remaining headroom accepts this step, kW (grid side).
    fn charge_headroom_kw(&self) -> f64 {
        let storable_kwh = (1.0 - self.soc).max(0.0) * self.capacity_kwh;
        storable_kwh / (self.eta_c * self.dt_hours)
    }

    /// Discharge power the stored energy can deliver this step, kW (grid side).
    fn discharge_headroom_kw(&self) -> f64 {
        let stored_kwh = self.soc.max(0.0) * self.capacity_kwh;
        stored_kwh * self.eta_d / self.dt_hours
    }
}

impl Storage for Battery {
    /// Clamps the setpoint to the power rating and the SOC headroom, then
    /// moves the SOC by the stored (charge) or withdrawn (discharge) energy.
    fn dispatch(&mut self, _time_s: f64, setpoint_kw: f64) -> SimResult<f64> {
        let realized_kw = if setpoint_kw > 0.0 {
            setpoint_kw
                .min(self.max_charge_kw)
                .min(self.charge_headroom_kw())
        } else if setpoint_kw < 0.0 {
            -(-setpoint_kw)
                .min(self.max_discharge_kw)
                .min(self.discharge_headroom_kw())
        } else {
            0.0
        };

        let energy_kwh = realized_kw * self.dt_hours;
        let soc_delta = if realized_kw >= 0.0 {
            energy_kwh * self.eta_c / self.capacity_kwh
        } else {
            energy_kwh / (self.eta_d * self.capacity_kwh)
        };
        self.soc = (self.soc + soc_delta).clamp(0.0, 1.0);
        Ok(realized_kw)
    }

    fn soc(&self) -> f64 {
        self.soc
    }

    fn capacity_kwh(&self) -> f64 {
        self.capacity_kwh
    }

    fn max_charge_kw(&self) -> f64 {
        self.max_charge_kw
    }

    fn max_discharge_kw(&self) -> f64 {
        self.max_discharge_kw
    }

    fn technology(&self) -> &'static str {
        "LithiumIon"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(step_s: u32) -> SimConfig {
        SimConfig::new(step_s, 1, 0)
    }

    fn ideal(soc: f64) -> Battery {
        Battery::new(10.0, soc, 5.0, 5.0, 1.0, 1.0, &cfg(900))
    }

    fn apply(battery: &mut Battery, setpoint_kw: f64) -> f64 {
        battery.dispatch(0.0, setpoint_kw).expect("battery dispatch never fails")
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        Battery::new(0.0, 0.5, 5.0, 5.0, 0.95, 0.95, &cfg(900));
    }

    #[test]
    #[should_panic]
    fn soc_above_one_panics() {
        Battery::new(10.0, 1.1, 5.0, 5.0, 0.95, 0.95, &cfg(900));
    }

    #[test]
    fn power_rating_caps_setpoint() {
        assert_eq!(apply(&mut ideal(0.5), 10.0), 5.0);
        assert_eq!(apply(&mut ideal(0.5), -10.0), -5.0);
        assert_eq!(apply(&mut ideal(0.5), 0.0), 0.0);
    }

    #[test]
    fn empty_battery_limits_discharge() {
        // 1 kWh left over a quarter hour is at most 4 kW
        let mut battery = ideal(0.1);
        assert!((apply(&mut battery, -5.0) + 4.0).abs() < 1e-9);
        assert!(battery.soc < 1e-9);
    }

    #[test]
    fn full_battery_limits_charge() {
        let mut battery = ideal(0.9);
        assert!((apply(&mut battery, 5.0) - 4.0).abs() < 1e-9);
        assert!((battery.soc - 1.0).abs() < 1e-9);
        assert_eq!(apply(&mut battery, 5.0), 0.0);
    }

    #[test]
    fn charging_loses_energy_to_efficiency() {
        // 1 kW over a 6 h step: 6 kWh drawn, 5.4 kWh stored
        let mut battery = Battery::new(10.0, 0.0, 5.0, 5.0, 0.9, 0.9, &cfg(6 * 3600));
        apply(&mut battery, 1.0);
        assert!((battery.soc - 0.54).abs() < 1e-9);
    }

    #[test]
    fn round_trip_delivers_discharge_efficiency_share() {
        let c = cfg(3600);
        let mut battery = Battery::new(10.0, 0.5, 2.0, 2.0, 0.9, 0.9, &c);
        while battery.soc < 0.99 {
            apply(&mut battery, 2.0);
        }

        let mut delivered_kwh = 0.0;
        while battery.soc > 0.01 {
            delivered_kwh += -apply(&mut battery, -2.0) * c.dt_hours;
        }
        assert!((delivered_kwh - 9.0).abs() < 0.1);
    }

    #[test]
    fn storage_trait_reports_limits() {
        let battery = Battery::new(10.0, 0.5, 3.0, 4.0, 0.95, 0.95, &cfg(900));
        assert_eq!(Storage::max_charge_kw(&battery), 3.0);
        assert_eq!(Storage::max_discharge_kw(&battery), 4.0);
        assert_eq!(battery.technology(), "LithiumIon");
        assert!(battery.pressure().is_none());
    }
}
