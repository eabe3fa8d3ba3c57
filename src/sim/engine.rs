//! Simulation loop driving devices, storage and the strategy tree.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::{SimulationConfig, Technology};
use crate::devices::{
    BaseLoad, Battery, Device, DeviceContext, HydrogenParams, HydrogenStorage, SolarPv, Storage,
};
use crate::error::{SimError, SimResult};
use crate::io::export::{self, SUMMARY_FILE, TIMESERIES_FILE};
use crate::physics::{ElectrolyzerPressureModel, PressureParams, ProportionalValve};
use crate::strategy::{self, OperationStrategy, StrategyNode, StrategyReport};

use super::cancel::CancelToken;
use super::clock::Clock;
use super::kpi::KpiReport;
use super::power_balance::{grid_kw, power_request_kw};
use super::types::{EnergyManagementState, SimConfig, StepResult, SystemState};

/// Summary written next to the time series of one simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub name: String,
    pub technology: String,
    pub steps: usize,
    pub step_s: u32,
    pub days: usize,
    pub wall_time_s: f64,
    pub kpi: KpiReport,
    pub strategies: Vec<StrategyReport>,
}

/// One simulation: profile devices, a storage unit and a root strategy,
/// advanced in fixed steps.
///
/// Step evaluation is single-threaded and deterministic for a given seed.
pub struct Simulation {
    name: String,
    config: SimConfig,
    load: BaseLoad,
    pv: SolarPv,
    storage: Box<dyn Storage>,
    root: StrategyNode,
    state: SystemState,
    cancel: CancelToken,
    max_wall_time: Option<Duration>,
}

impl Simulation {
    pub fn new(
        name: impl Into<String>,
        config: SimConfig,
        load: BaseLoad,
        pv: SolarPv,
        storage: Box<dyn Storage>,
        root: Box<dyn OperationStrategy>,
        cancel: CancelToken,
    ) -> Self {
        let state = SystemState {
            time_s: 0.0,
            soc: storage.soc(),
            storage_kw: 0.0,
            load_kw: 0.0,
            pv_kw: 0.0,
            capacity_kwh: storage.capacity_kwh(),
            max_charge_kw: storage.max_charge_kw(),
            max_discharge_kw: storage.max_discharge_kw(),
            dt_hours: config.dt_hours,
            pressure: storage.pressure(),
        };
        Self {
            name: name.into(),
            config,
            load,
            pv,
            storage,
            root: StrategyNode::new(root),
            state,
            cancel,
            max_wall_time: None,
        }
    }

    /// Builds a simulation from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` for the first validation error, and
    /// `SimError::Strategy` / `SimError::Physics` if the strategy tree or the
    /// pressure model cannot be built.
    pub fn from_config(
        name: &str,
        cfg: &SimulationConfig,
        cancel: CancelToken,
    ) -> SimResult<Self> {
        if let Some(err) = cfg.validate(name).into_iter().next() {
            return Err(err.into());
        }

        let g = &cfg.general;
        let config = SimConfig::new(g.step_s, g.days, g.seed);
        let load = BaseLoad::new(
            cfg.load.base_kw,
            cfg.load.amp_kw,
            cfg.load.phase_rad,
            cfg.load.noise_std,
            g.seed,
        );
        let pv = SolarPv::new(
            cfg.pv.kw_peak,
            cfg.pv.sunrise_hour,
            cfg.pv.sunset_hour,
            cfg.pv.noise_std,
            g.seed.wrapping_add(1),
        );

        let s = &cfg.storage;
        let storage: Box<dyn Storage> = match s.technology {
            Technology::LithiumIon => Box::new(Battery::new(
                s.capacity_kwh,
                s.initial_soc,
                s.max_charge_kw,
                s.max_discharge_kw,
                s.eta_charge,
                s.eta_discharge,
                &config,
            )),
            Technology::Hydrogen => {
                let h = &cfg.hydrogen;
                let model = ElectrolyzerPressureModel::new(
                    PressureParams {
                        cathode_volume_m3: h.cathode_volume_m3,
                        anode_volume_m3: h.anode_volume_m3,
                        target_cathode_bar: h.target_cathode_bar,
                        target_anode_bar: h.target_anode_bar,
                    },
                    ProportionalValve::new(h.valve_band_bar),
                    0.0,
                )?;
                Box::new(HydrogenStorage::new(
                    HydrogenParams {
                        capacity_kwh: s.capacity_kwh,
                        initial_soc: s.initial_soc,
                        electrolyzer_max_kw: s.max_charge_kw,
                        fuel_cell_max_kw: s.max_discharge_kw,
                        fuel_cell_efficiency: h.fuel_cell_efficiency,
                        cell_voltage_v: h.cell_voltage_v,
                        cell_count: h.cell_count,
                        stack_temperature_k: h.stack_temperature_k,
                    },
                    Box::new(model),
                    &config,
                ))
            }
        };

        let root = strategy::build(&cfg.strategy)?;
        let mut sim = Self::new(name, config, load, pv, storage, root, cancel);
        sim.max_wall_time = g
            .max_wall_time_s
            .and_then(|limit| Duration::try_from_secs_f64(limit).ok());
        Ok(sim)
    }

    /// Fails the run with `SimError::Timeout` once `limit` has elapsed.
    pub fn with_max_wall_time(mut self, limit: Duration) -> Self {
        self.max_wall_time = Some(limit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &StrategyNode {
        &self.root
    }

    /// Executes the step ending at `time_s`.
    ///
    /// # Errors
    ///
    /// Propagates strategy protocol errors and storage / physics failures.
    pub fn step(&mut self, timestep: usize, time_s: f64) -> SimResult<StepResult> {
        let ctx = DeviceContext::new(time_s);
        let load_kw = self.load.power_kw(&ctx);
        let pv_kw = self.pv.power_kw(&ctx);
        let request_kw = power_request_kw(load_kw, pv_kw);

        let setpoint_kw = self.root.evaluate(time_s, &self.state, request_kw)?;
        let storage_kw = self.storage.dispatch(time_s, setpoint_kw)?;
        let grid = grid_kw(load_kw, pv_kw, storage_kw);
        let soc = self.storage.soc();

        let ems = EnergyManagementState {
            time_s,
            load_kw,
            pv_kw,
            power_request_kw: request_kw,
            setpoint_kw,
            storage_kw,
            grid_kw: grid,
            soc,
            dt_hours: self.config.dt_hours,
        };
        self.root.commit(&ems)?;

        let pressure = self.storage.pressure();
        self.state = SystemState {
            time_s,
            soc,
            storage_kw,
            load_kw,
            pv_kw,
            pressure,
            ..self.state.clone()
        };

        Ok(StepResult {
            timestep,
            time_s,
            load_kw,
            pv_kw,
            power_request_kw: request_kw,
            setpoint_kw,
            storage_kw,
            grid_kw: grid,
            soc,
            cathode_pressure_bar: pressure.map(|p| p.cathode_pressure_bar),
            h2_outflow_mol_per_s: pressure.map(|p| p.h2_outflow_mol_per_s),
        })
    }

    /// Executes all timesteps, then closes the strategy tree and the storage.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Cancelled` when the cancel token trips,
    /// `SimError::Timeout` when the wall-time limit passes, and any step error.
    pub fn run(&mut self) -> SimResult<Vec<StepResult>> {
        let started = Instant::now();
        let total = self.config.total_steps();
        let mut clock = Clock::new(self.state.time_s, f64::from(self.config.step_s), total);
        let mut results = Vec::with_capacity(total);

        while let Some((t, time_s)) = clock.tick() {
            if self.cancel.is_cancelled() {
                return Err(SimError::Cancelled {
                    name: self.name.clone(),
                    time_s,
                });
            }
            if let Some(limit) = self.max_wall_time {
                if started.elapsed() >= limit {
                    return Err(SimError::Timeout {
                        name: self.name.clone(),
                        limit_s: limit.as_secs_f64(),
                    });
                }
            }
            let result = self.step(t, time_s)?;
            trace!(sim = %self.name, "{result}");
            results.push(result);
        }

        self.root.close()?;
        self.storage.close()?;
        Ok(results)
    }

    /// Runs to completion and writes `timeseries.csv` and `summary.toml`
    /// into `dir`, which must exist.
    ///
    /// # Errors
    ///
    /// Returns any run error, or an export error.
    pub fn run_to_dir(&mut self, dir: &Path) -> SimResult<SimulationSummary> {
        let started = Instant::now();
        debug!(sim = %self.name, steps = self.config.total_steps(), "simulation started");
        let results = self.run()?;

        export::export_csv(&results, &dir.join(TIMESERIES_FILE))?;
        let summary = self.summarize(&results, started.elapsed());
        export::write_summary(&summary, &dir.join(SUMMARY_FILE))?;

        debug!(sim = %self.name, wall_time_s = summary.wall_time_s, "simulation finished");
        Ok(summary)
    }

    pub fn summarize(&self, results: &[StepResult], wall_time: Duration) -> SimulationSummary {
        let mut strategies = Vec::new();
        self.root.report("", &mut strategies);
        SimulationSummary {
            name: self.name.clone(),
            technology: self.storage.technology().to_string(),
            steps: results.len(),
            step_s: self.config.step_s,
            days: self.config.days,
            wall_time_s: wall_time.as_secs_f64(),
            kpi: KpiReport::from_results(results, self.config.dt_hours, self.storage.capacity_kwh()),
            strategies,
        }
    }
}
