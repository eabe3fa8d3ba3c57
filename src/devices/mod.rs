//! Load and generation profiles plus storage technologies.

/// Residential base-load profile generator.
pub mod baseload;
/// Lithium-ion battery storage model.
pub mod battery;
/// Electrolyzer, tank and fuel cell storage chain.
pub mod hydrogen;
/// Solar photovoltaic generation model.
pub mod solar;
pub mod types;

pub use baseload::BaseLoad;
pub use battery::Battery;
pub use hydrogen::{HydrogenParams, HydrogenStorage};
pub use solar::SolarPv;
pub use types::{Device, DeviceContext, Storage};
