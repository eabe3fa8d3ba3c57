//! TOML-based batch configuration and preset definitions.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::FailurePolicy;
use crate::error::ConfigError;
use crate::physics::constants::AMBIENT_PRESSURE_BAR;
use crate::sim::types::SECONDS_PER_DAY;

/// Top-level batch file: one `[batch]` table and an ordered
/// `[[simulation]]` array.
///
/// Load from TOML with [`BatchFile::from_toml_file`] or use
/// [`BatchFile::from_preset`] for a built-in batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchFile {
    /// Scheduler settings.
    pub batch: BatchSection,
    /// Simulations in file order; names may repeat until validated.
    pub simulation: Vec<NamedConfig>,
}

/// Scheduler settings of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchSection {
    /// Maximum number of concurrently alive jobs.
    pub cores: usize,
    /// Root directory for all results.
    pub output_root: PathBuf,
    /// Sub-directory of `output_root` holding one directory per simulation.
    pub job_kind_dir: String,
    /// Simulations grouped into one job.
    pub simulations_per_job: usize,
    /// Simulations run concurrently inside a job (1 = sequential).
    pub sub_batch_size: usize,
    /// Admission polling interval (ms).
    pub poll_interval_ms: u64,
    /// What happens to unstarted jobs after a failure.
    pub failure_policy: FailurePolicy,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            cores: std::thread::available_parallelism().map_or(1, |n| n.get()),
            output_root: PathBuf::from("results"),
            job_kind_dir: "simulation".to_string(),
            simulations_per_job: 1,
            sub_batch_size: 1,
            poll_interval_ms: 1000,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// A simulation configuration paired with its unique name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SimulationEntry", into = "SimulationEntry")]
pub struct NamedConfig {
    pub name: String,
    pub config: SimulationConfig,
}

impl NamedConfig {
    pub fn new(name: impl Into<String>, config: SimulationConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

/// On-disk shape of one `[[simulation]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SimulationEntry {
    name: String,
    #[serde(default)]
    general: GeneralConfig,
    #[serde(default)]
    load: LoadConfig,
    #[serde(default)]
    pv: PvConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    hydrogen: HydrogenConfig,
    #[serde(default)]
    strategy: StrategyConfig,
}

impl From<SimulationEntry> for NamedConfig {
    fn from(e: SimulationEntry) -> Self {
        NamedConfig {
            name: e.name,
            config: SimulationConfig {
                general: e.general,
                load: e.load,
                pv: e.pv,
                storage: e.storage,
                hydrogen: e.hydrogen,
                strategy: e.strategy,
            },
        }
    }
}

impl From<NamedConfig> for SimulationEntry {
    fn from(n: NamedConfig) -> Self {
        let c = n.config;
        SimulationEntry {
            name: n.name,
            general: c.general,
            load: c.load,
            pv: c.pv,
            storage: c.storage,
            hydrogen: c.hydrogen,
            strategy: c.strategy,
        }
    }
}

/// Complete configuration of one simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Timing and global parameters.
    pub general: GeneralConfig,
    /// Household load profile.
    pub load: LoadConfig,
    /// PV generation profile.
    pub pv: PvConfig,
    /// Storage technology and ratings.
    pub storage: StorageConfig,
    /// Electrolyzer, fuel cell and pressure parameters (hydrogen only).
    pub hydrogen: HydrogenConfig,
    /// Operation strategy tree.
    pub strategy: StrategyConfig,
}

/// Simulation timing and global parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    /// Timestep length in seconds (must divide a day).
    pub step_s: u32,
    /// Number of days to simulate (must be > 0).
    pub days: usize,
    /// Master random seed.
    pub seed: u64,
    /// Wall-clock limit for one simulation run (s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_wall_time_s: Option<f64>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            step_s: 900,
            days: 1,
            seed: 42,
            max_wall_time_s: None,
        }
    }
}

/// Household load profile parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// Baseline consumption (kW).
    pub base_kw: f64,
    /// Sinusoidal amplitude (kW).
    pub amp_kw: f64,
    /// Phase offset (radians).
    pub phase_rad: f64,
    /// Gaussian noise standard deviation (kW).
    pub noise_std: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            base_kw: 0.8,
            amp_kw: 0.7,
            phase_rad: 1.2,
            noise_std: 0.05,
        }
    }
}

/// PV generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PvConfig {
    /// Peak generation (kW).
    pub kw_peak: f64,
    /// Sunrise hour of day (inclusive).
    pub sunrise_hour: f64,
    /// Sunset hour of day (exclusive).
    pub sunset_hour: f64,
    /// Noise standard deviation as a fraction of output.
    pub noise_std: f64,
}

impl Default for PvConfig {
    fn default() -> Self {
        Self {
            kw_peak: 5.0,
            sunrise_hour: 6.0,
            sunset_hour: 18.0,
            noise_std: 0.05,
        }
    }
}

/// Storage technology selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    #[default]
    LithiumIon,
    Hydrogen,
}

/// Storage ratings shared by all technologies.
///
/// For hydrogen, `max_charge_kw` is the electrolyzer rating and
/// `max_discharge_kw` the fuel cell rating; the efficiencies apply to
/// lithium-ion only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub technology: Technology,
    /// Usable energy capacity (kWh).
    pub capacity_kwh: f64,
    /// Initial state of charge (0.0–1.0).
    pub initial_soc: f64,
    /// Maximum charging power (kW).
    pub max_charge_kw: f64,
    /// Maximum discharging power (kW).
    pub max_discharge_kw: f64,
    /// Charge efficiency (0.0–1.0).
    pub eta_charge: f64,
    /// Discharge efficiency (0.0–1.0).
    pub eta_discharge: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            technology: Technology::LithiumIon,
            capacity_kwh: 10.0,
            initial_soc: 0.5,
            max_charge_kw: 5.0,
            max_discharge_kw: 5.0,
            eta_charge: 0.95,
            eta_discharge: 0.95,
        }
    }
}

/// Electrolyzer stack, fuel cell and gas separator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HydrogenConfig {
    /// Fuel cell electrical efficiency on LHV basis.
    pub fuel_cell_efficiency: f64,
    /// Cell voltage at rated operation (V).
    pub cell_voltage_v: f64,
    /// Cells in series.
    pub cell_count: u32,
    /// Stack temperature (K).
    pub stack_temperature_k: f64,
    /// Cathode (H2) gas volume (m³).
    pub cathode_volume_m3: f64,
    /// Anode (O2) gas volume (m³).
    pub anode_volume_m3: f64,
    /// Cathode target pressure (bar, absolute).
    pub target_cathode_bar: f64,
    /// Anode target pressure (bar, absolute).
    pub target_anode_bar: f64,
    /// Proportional band of the control valves (bar).
    pub valve_band_bar: f64,
}

impl Default for HydrogenConfig {
    fn default() -> Self {
        Self {
            fuel_cell_efficiency: 0.5,
            cell_voltage_v: 1.8,
            cell_count: 20,
            stack_temperature_k: 353.15,
            cathode_volume_m3: 0.5,
            anode_volume_m3: 0.5,
            target_cathode_bar: 30.0,
            target_anode_bar: 2.0,
            valve_band_bar: 2.0,
        }
    }
}

/// Operation strategy tree, tagged by `kind`.
///
/// ```toml
/// [simulation.strategy]
/// kind = "serial"
/// start_hour = 8.0
/// end_hour = 16.0
/// in_window = { kind = "pv_greedy" }
/// outside_window = { kind = "soc_maintenance", target_soc = 0.5 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    Idle,
    #[default]
    PvGreedy,
    PeakShaving {
        threshold_kw: f64,
    },
    SocMaintenance {
        target_soc: f64,
    },
    /// Time-window switch between exactly two children.
    Serial {
        start_hour: f64,
        end_hour: f64,
        in_window: Box<StrategyConfig>,
        outside_window: Box<StrategyConfig>,
    },
    /// Priority stack over any number of children.
    Stacked {
        children: Vec<StrategyConfig>,
    },
}

impl StrategyConfig {
    fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        match self {
            StrategyConfig::Idle | StrategyConfig::PvGreedy => {}
            StrategyConfig::PeakShaving { threshold_kw } => {
                if !threshold_kw.is_finite() {
                    errors.push(ConfigError::new(
                        format!("{field}.threshold_kw"),
                        "must be finite",
                    ));
                }
            }
            StrategyConfig::SocMaintenance { target_soc } => {
                if !(0.0..=1.0).contains(target_soc) {
                    errors.push(ConfigError::new(
                        format!("{field}.target_soc"),
                        "must be in [0.0, 1.0]",
                    ));
                }
            }
            StrategyConfig::Serial {
                start_hour,
                end_hour,
                in_window,
                outside_window,
            } => {
                for (name, hour) in [("start_hour", start_hour), ("end_hour", end_hour)] {
                    if !(0.0..=24.0).contains(hour) {
                        errors.push(ConfigError::new(
                            format!("{field}.{name}"),
                            "must be in [0, 24]",
                        ));
                    }
                }
                if start_hour == end_hour {
                    errors.push(ConfigError::new(
                        format!("{field}.end_hour"),
                        "must differ from start_hour",
                    ));
                }
                in_window.validate(&format!("{field}.in_window"), errors);
                outside_window.validate(&format!("{field}.outside_window"), errors);
            }
            StrategyConfig::Stacked { children } => {
                if children.is_empty() {
                    errors.push(ConfigError::new(
                        format!("{field}.children"),
                        "must not be empty",
                    ));
                }
                for (i, child) in children.iter().enumerate() {
                    child.validate(&format!("{field}.children[{i}]"), errors);
                }
            }
        }
    }
}

impl SimulationConfig {
    /// Validates all fields and returns a list of errors.
    ///
    /// Field paths are prefixed with `prefix` (e.g. `"simulation[0]"`).
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self, prefix: &str) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let field = |name: &str| format!("{prefix}.{name}");

        let g = &self.general;
        if g.step_s == 0 || SECONDS_PER_DAY % g.step_s != 0 {
            errors.push(ConfigError::new(
                field("general.step_s"),
                format!("must be > 0 and divide {SECONDS_PER_DAY}"),
            ));
        }
        if g.days == 0 {
            errors.push(ConfigError::new(field("general.days"), "must be > 0"));
        }
        if let Some(limit) = g.max_wall_time_s {
            if !(limit > 0.0) {
                errors.push(ConfigError::new(
                    field("general.max_wall_time_s"),
                    "must be > 0",
                ));
            }
        }

        let l = &self.load;
        if l.base_kw < 0.0 || l.noise_std < 0.0 {
            errors.push(ConfigError::new(
                field("load"),
                "base_kw and noise_std must be >= 0",
            ));
        }

        let pv = &self.pv;
        if !(0.0 <= pv.sunrise_hour && pv.sunrise_hour < pv.sunset_hour && pv.sunset_hour <= 24.0)
        {
            errors.push(ConfigError::new(
                field("pv.sunrise_hour"),
                "must satisfy 0 <= sunrise_hour < sunset_hour <= 24",
            ));
        }
        if pv.kw_peak < 0.0 {
            errors.push(ConfigError::new(field("pv.kw_peak"), "must be >= 0"));
        }

        let s = &self.storage;
        if !(s.capacity_kwh > 0.0) {
            errors.push(ConfigError::new(field("storage.capacity_kwh"), "must be > 0"));
        }
        if !(0.0..=1.0).contains(&s.initial_soc) {
            errors.push(ConfigError::new(
                field("storage.initial_soc"),
                "must be in [0.0, 1.0]",
            ));
        }
        if s.max_charge_kw < 0.0 || s.max_discharge_kw < 0.0 {
            errors.push(ConfigError::new(
                field("storage.max_charge_kw"),
                "power ratings must be >= 0",
            ));
        }
        for (name, eta) in [("eta_charge", s.eta_charge), ("eta_discharge", s.eta_discharge)] {
            if !(eta > 0.0 && eta <= 1.0) {
                errors.push(ConfigError::new(
                    field(&format!("storage.{name}")),
                    "must be in (0.0, 1.0]",
                ));
            }
        }

        if s.technology == Technology::Hydrogen {
            let h = &self.hydrogen;
            if !(h.fuel_cell_efficiency > 0.0 && h.fuel_cell_efficiency <= 1.0) {
                errors.push(ConfigError::new(
                    field("hydrogen.fuel_cell_efficiency"),
                    "must be in (0.0, 1.0]",
                ));
            }
            if !(h.cell_voltage_v > 0.0) || h.cell_count == 0 {
                errors.push(ConfigError::new(
                    field("hydrogen.cell_voltage_v"),
                    "cell voltage and cell count must be > 0",
                ));
            }
            if !(h.stack_temperature_k > 0.0) {
                errors.push(ConfigError::new(
                    field("hydrogen.stack_temperature_k"),
                    "must be > 0",
                ));
            }
            if !(h.cathode_volume_m3 > 0.0) || !(h.anode_volume_m3 > 0.0) {
                errors.push(ConfigError::new(
                    field("hydrogen.cathode_volume_m3"),
                    "gas volumes must be > 0",
                ));
            }
            if h.target_cathode_bar < AMBIENT_PRESSURE_BAR || h.target_anode_bar < AMBIENT_PRESSURE_BAR
            {
                errors.push(ConfigError::new(
                    field("hydrogen.target_cathode_bar"),
                    format!("target pressures must be >= {AMBIENT_PRESSURE_BAR} bar"),
                ));
            }
            if !(h.valve_band_bar > 0.0) {
                errors.push(ConfigError::new(
                    field("hydrogen.valve_band_bar"),
                    "must be > 0",
                ));
            }
        }

        self.strategy.validate(&field("strategy"), &mut errors);
        errors
    }
}

/// Checks that `name` can be used as a single directory component.
fn valid_simulation_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}

/// Returns the first duplicated name, in order of appearance.
pub fn first_duplicate_name<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    names.into_iter().find(|name| !seen.insert(*name))
}

impl BatchFile {
    /// Available preset names.
    pub const PRESETS: &[&str] = &["demo", "hydrogen"];

    /// Lithium-ion batch comparing the dispatch strategies over two days.
    pub fn demo() -> Self {
        let general = GeneralConfig {
            days: 2,
            ..GeneralConfig::default()
        };
        let base = SimulationConfig {
            general,
            ..SimulationConfig::default()
        };
        let with_strategy = |strategy: StrategyConfig| SimulationConfig {
            strategy,
            ..base.clone()
        };

        Self {
            batch: BatchSection::default(),
            simulation: vec![
                NamedConfig::new("idle", with_strategy(StrategyConfig::Idle)),
                NamedConfig::new("pv_greedy", with_strategy(StrategyConfig::PvGreedy)),
                NamedConfig::new(
                    "peak_shaving",
                    with_strategy(StrategyConfig::Stacked {
                        children: vec![
                            StrategyConfig::PeakShaving { threshold_kw: 1.2 },
                            StrategyConfig::PvGreedy,
                        ],
                    }),
                ),
                NamedConfig::new(
                    "day_night",
                    with_strategy(StrategyConfig::Serial {
                        start_hour: 8.0,
                        end_hour: 18.0,
                        in_window: Box::new(StrategyConfig::PvGreedy),
                        outside_window: Box::new(StrategyConfig::SocMaintenance {
                            target_soc: 0.3,
                        }),
                    }),
                ),
            ],
        }
    }

    /// Hydrogen batch: electrolyzer sized for a large PV array.
    pub fn hydrogen() -> Self {
        let base = SimulationConfig {
            general: GeneralConfig {
                days: 2,
                ..GeneralConfig::default()
            },
            pv: PvConfig {
                kw_peak: 12.0,
                sunrise_hour: 5.0,
                sunset_hour: 19.0,
                ..PvConfig::default()
            },
            storage: StorageConfig {
                technology: Technology::Hydrogen,
                capacity_kwh: 40.0,
                initial_soc: 0.2,
                max_charge_kw: 6.0,
                max_discharge_kw: 3.0,
                ..StorageConfig::default()
            },
            ..SimulationConfig::default()
        };

        Self {
            batch: BatchSection {
                job_kind_dir: "hydrogen".to_string(),
                ..BatchSection::default()
            },
            simulation: vec![
                NamedConfig::new("h2_pv_greedy", base.clone()),
                NamedConfig::new(
                    "h2_peak_shaving",
                    SimulationConfig {
                        strategy: StrategyConfig::Stacked {
                            children: vec![
                                StrategyConfig::PeakShaving { threshold_kw: 1.5 },
                                StrategyConfig::PvGreedy,
                            ],
                        },
                        ..base
                    },
                ),
            ],
        }
    }

    /// Loads a batch from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "demo" => Ok(Self::demo()),
            "hydrogen" => Ok(Self::hydrogen()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a batch from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("batch", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a batch from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Serializes the batch back to TOML.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a value cannot be represented in TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates the batch settings and every simulation.
    ///
    /// Returns an empty vector if the batch is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let b = &self.batch;

        if b.cores == 0 {
            errors.push(ConfigError::new("batch.cores", "must be > 0"));
        }
        if b.simulations_per_job == 0 {
            errors.push(ConfigError::new("batch.simulations_per_job", "must be > 0"));
        }
        if b.sub_batch_size == 0 {
            errors.push(ConfigError::new("batch.sub_batch_size", "must be > 0"));
        }
        if b.poll_interval_ms == 0 {
            errors.push(ConfigError::new("batch.poll_interval_ms", "must be > 0"));
        }
        if !valid_simulation_name(&b.job_kind_dir) {
            errors.push(ConfigError::new(
                "batch.job_kind_dir",
                "must be a single non-empty path component",
            ));
        }

        errors.extend(validate_simulations(&self.simulation));
        errors
    }
}

/// Validates a config set: non-empty, usable unique names, valid sections.
pub fn validate_simulations(configs: &[NamedConfig]) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    if configs.is_empty() {
        errors.push(ConfigError::new("simulation", "at least one simulation is required"));
    }
    for (i, named) in configs.iter().enumerate() {
        let prefix = format!("simulation[{i}]");
        if !valid_simulation_name(&named.name) {
            errors.push(ConfigError::new(
                format!("{prefix}.name"),
                format!("\"{}\" is not usable as a directory name", named.name),
            ));
        }
        errors.extend(named.config.validate(&prefix));
    }
    if let Some(dup) = first_duplicate_name(configs.iter().map(|c| c.name.as_str())) {
        errors.push(ConfigError::new(
            "simulation.name",
            format!("duplicate simulation name \"{dup}\""),
        ));
    }
    errors
}
