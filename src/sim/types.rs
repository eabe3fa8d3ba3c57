//! Core simulation types: timing, shared state snapshots and step records.

use std::fmt;

use crate::devices::types::SECONDS_PER_HOUR;
use crate::physics::PressureState;

/// Seconds in one simulated day.
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Centralized simulation timing.
///
/// All devices and the engine reference this struct for timing parameters,
/// eliminating duplicated `dt_hours` computations.
///
/// # Examples
///
/// ```
/// use ess_sim::sim::types::SimConfig;
///
/// let cfg = SimConfig::new(3600, 1, 42);
/// assert_eq!(cfg.dt_hours, 1.0);
/// assert_eq!(cfg.total_steps(), 24);
/// ```
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Timestep length in seconds.
    pub step_s: u32,
    /// Number of days to simulate.
    pub days: usize,
    /// Duration of one timestep in hours.
    pub dt_hours: f64,
    /// Master random seed for reproducibility.
    pub seed: u64,
}

impl SimConfig {
    /// # Panics
    ///
    /// Panics if `step_s` is zero or does not divide a day, or `days` is zero.
    pub fn new(step_s: u32, days: usize, seed: u64) -> Self {
        assert!(step_s > 0, "step_s must be > 0");
        assert!(SECONDS_PER_DAY % step_s == 0, "step_s must divide a day");
        assert!(days > 0, "days must be > 0");
        Self {
            step_s,
            days,
            dt_hours: f64::from(step_s) / SECONDS_PER_HOUR,
            seed,
        }
    }

    /// Steps per simulated day.
    pub fn steps_per_day(&self) -> usize {
        (SECONDS_PER_DAY / self.step_s) as usize
    }

    /// Total number of simulation steps across all days.
    pub fn total_steps(&self) -> usize {
        self.steps_per_day() * self.days
    }
}

/// Physical/electrical snapshot of the simulated system.
///
/// Produced by the simulation at the end of each step and handed to
/// strategies as a read-only reference for the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemState {
    /// Time this snapshot belongs to, s.
    pub time_s: f64,
    /// Storage state of charge (0.0 to 1.0).
    pub soc: f64,
    /// Realized storage power of the last step (kW; positive=charge).
    pub storage_kw: f64,
    /// Load of the last step (kW, positive).
    pub load_kw: f64,
    /// PV generation of the last step (kW, feeder convention: negative).
    pub pv_kw: f64,
    /// Usable storage capacity, kWh.
    pub capacity_kwh: f64,
    /// Maximum storage charging power, kW.
    pub max_charge_kw: f64,
    /// Maximum storage discharging power, kW.
    pub max_discharge_kw: f64,
    /// Step length, h.
    pub dt_hours: f64,
    /// Gas pressures for hydrogen storage.
    pub pressure: Option<PressureState>,
}

/// Realized outcome of one step, persisted by strategies on `update()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyManagementState {
    pub time_s: f64,
    pub load_kw: f64,
    pub pv_kw: f64,
    /// Net demand before storage (`load + pv`, feeder convention).
    pub power_request_kw: f64,
    /// Setpoint returned by the root strategy.
    pub setpoint_kw: f64,
    /// Power the storage actually realized.
    pub storage_kw: f64,
    /// Grid exchange (positive=import).
    pub grid_kw: f64,
    pub soc: f64,
    pub dt_hours: f64,
}

/// Complete record of one simulation timestep.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Timestep index.
    pub timestep: usize,
    /// Simulation time at the end of the step, s.
    pub time_s: f64,
    pub load_kw: f64,
    pub pv_kw: f64,
    pub power_request_kw: f64,
    pub setpoint_kw: f64,
    pub storage_kw: f64,
    pub grid_kw: f64,
    /// SOC after this step.
    pub soc: f64,
    /// Cathode pressure after this step (hydrogen only), bar.
    pub cathode_pressure_bar: Option<f64>,
    /// Valve H2 outflow during this step (hydrogen only), mol/s.
    pub h2_outflow_mol_per_s: Option<f64>,
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>5} ({:>8.0}s) | load={:.2} pv={:.2} req={:.2} | set={:.2} bat={:.2} \
             (SoC={:.1}%) | grid={:.2} kW",
            self.timestep,
            self.time_s,
            self.load_kw,
            self.pv_kw,
            self.power_request_kw,
            self.setpoint_kw,
            self.storage_kw,
            self.soc * 100.0,
            self.grid_kw,
        )?;
        if let Some(p) = self.cathode_pressure_bar {
            write!(f, " | p_H2={p:.2} bar")?;
        }
        Ok(())
    }
}
