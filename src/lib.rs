//! Parallel simulation of behind-the-meter energy storage systems.
//!
//! Each simulation couples load and PV profiles with a storage unit
//! (lithium-ion or a hydrogen chain with a pressure sub-model) operated by a
//! tree of strategies. Batches of named simulations run as core-bounded jobs.

pub mod batch;
pub mod config;
pub mod devices;
pub mod error;
pub mod io;
pub mod physics;
/// Simulation engine, clock, power balance and KPIs.
pub mod sim;
pub mod strategy;
