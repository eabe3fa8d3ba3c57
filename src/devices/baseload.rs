use rand::{SeedableRng, rngs::StdRng};

use crate::devices::types::{Device, DeviceContext, HOURS_PER_DAY, gaussian_noise};

/// A household load profile following a daily sinusoid.
///
/// `BaseLoad` creates a sinusoidal power demand pattern with configurable baseline,
/// amplitude, phase, and random noise to simulate typical daily load patterns.
///
/// # Examples
///
/// ```
/// use ess_sim::devices::{BaseLoad, Device, DeviceContext};
///
/// let mut load = BaseLoad::new(1.0, 0.5, 0.0, 0.0, 42);
/// let noon = load.power_kw(&DeviceContext::new(12.0 * 3600.0));
/// assert!(noon >= 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct BaseLoad {
    /// Baseline power consumption in kilowatts
    pub base_kw: f64,

    /// Amplitude of the sinusoidal variation in kilowatts
    pub amp_kw: f64,

    /// Phase offset of the sinusoidal pattern in radians
    pub phase_rad: f64,

    /// Standard deviation of the Gaussian noise in kilowatts
    pub noise_std: f64,

    rng: StdRng,
}

impl BaseLoad {
    /// Creates a new baseload generator.
    ///
    /// # Arguments
    ///
    /// * `base_kw` - The baseline power consumption in kilowatts
    /// * `amp_kw` - The amplitude of sinusoidal daily variation in kilowatts
    /// * `phase_rad` - The phase offset in radians (0 = zero crossing at midnight)
    /// * `noise_std` - The standard deviation of Gaussian noise in kilowatts
    /// * `seed` - Random seed for reproducible noise generation
    pub fn new(base_kw: f64, amp_kw: f64, phase_rad: f64, noise_std: f64, seed: u64) -> Self {
        Self {
            base_kw,
            amp_kw,
            phase_rad,
            noise_std: noise_std.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Device for BaseLoad {
    /// Demand in kW, never negative.
    fn power_kw(&mut self, context: &DeviceContext) -> f64 {
        let day_pos = context.hour_of_day() / HOURS_PER_DAY;
        let angle = 2.0 * std::f64::consts::PI * day_pos + self.phase_rad;
        let noise = gaussian_noise(&mut self.rng, self.noise_std);

        let kw = self.base_kw + self.amp_kw * angle.sin() + noise;
        kw.max(0.0)
    }

    fn device_type(&self) -> &'static str {
        "BaseLoad"
    }
}
