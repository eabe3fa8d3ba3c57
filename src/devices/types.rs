//! Common types and traits for device simulation components.

use rand::{Rng, rngs::StdRng};

use crate::error::SimResult;

/// Seconds in one hour.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Hours in one day.
pub const HOURS_PER_DAY: f64 = 24.0;

/// Contextual information passed to profile devices.
#[derive(Debug, Clone, Copy)]
pub struct DeviceContext {
    /// Simulation time in seconds since start.
    pub time_s: f64,
}

impl DeviceContext {
    pub fn new(time_s: f64) -> Self {
        Self { time_s }
    }

    /// Hour of day in `[0, 24)`.
    pub fn hour_of_day(&self) -> f64 {
        hour_of_day(self.time_s)
    }
}

/// Hour of day in `[0, 24)` for a simulation time in seconds.
pub fn hour_of_day(time_s: f64) -> f64 {
    (time_s / SECONDS_PER_HOUR).rem_euclid(HOURS_PER_DAY)
}

/// Trait defining an uncontrolled profile that produces or consumes electricity.
///
/// Positive values indicate consumption (load), negative values generation.
pub trait Device {
    /// Returns the power in kW at the time in `context`.
    fn power_kw(&mut self, context: &DeviceContext) -> f64;

    /// Returns a human-readable type name for the device.
    fn device_type(&self) -> &'static str;
}

/// Trait for a storage technology that realizes power setpoints.
///
/// # Power Flow Convention (Feeder)
/// - Positive setpoint/return: Charging (load on feeder)
/// - Negative setpoint/return: Discharging (generation on feeder)
pub trait Storage: Send {
    /// Applies `setpoint_kw` for the step ending at `time_s` and returns the
    /// realized power after power, energy and efficiency limits.
    fn dispatch(&mut self, time_s: f64, setpoint_kw: f64) -> SimResult<f64>;

    /// State of charge as a fraction (0.0 to 1.0).
    fn soc(&self) -> f64;

    /// Usable energy capacity in kWh.
    fn capacity_kwh(&self) -> f64;

    /// Maximum charging power in kW (positive magnitude).
    fn max_charge_kw(&self) -> f64;

    /// Maximum discharging power in kW (positive magnitude).
    fn max_discharge_kw(&self) -> f64;

    /// Returns a human-readable technology name.
    fn technology(&self) -> &'static str;

    /// Pressure state for technologies with a gas sub-model.
    fn pressure(&self) -> Option<crate::physics::PressureState> {
        None
    }

    /// Releases sub-models at the end of a run.
    fn close(&mut self) -> SimResult<()> {
        Ok(())
    }
}

/// Fraction of peak output for a half-sine daylight profile.
///
/// Zero outside `[sunrise_hour, sunset_hour)`, one at solar noon.
pub fn daylight_frac(hour: f64, sunrise_hour: f64, sunset_hour: f64) -> f64 {
    if hour < sunrise_hour || hour >= sunset_hour {
        return 0.0;
    }
    let x = (hour - sunrise_hour) / (sunset_hour - sunrise_hour);
    (std::f64::consts::PI * x).sin().max(0.0)
}

/// Utility function to generate Gaussian noise using Box-Muller transform.
///
/// Returns a value from a Gaussian distribution with mean 0 and the given
/// standard deviation.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}
