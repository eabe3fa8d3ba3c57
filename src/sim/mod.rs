//! Single-simulation engine: clock, power balance, KPIs and the step loop.

pub mod cancel;
/// Fixed-step simulation clock.
pub mod clock;
pub mod engine;
pub mod kpi;
pub mod power_balance;
pub mod types;

pub use cancel::CancelToken;
pub use engine::{Simulation, SimulationSummary};
pub use kpi::KpiReport;
pub use types::{EnergyManagementState, SimConfig, StepResult, SystemState};
