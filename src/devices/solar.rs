use crate::devices::types::{Device, DeviceContext, daylight_frac, gaussian_noise};
use rand::{SeedableRng, rngs::StdRng};

/// A solar PV generator that models power generation based on daylight hours.
///
/// `SolarPv` creates a half-sine generation profile between sunrise and sunset
/// with configurable peak power output and multiplicative noise for weather.
///
/// # Power Flow Convention (Feeder)
/// Returns **negative** values during daylight (generation reduces feeder load).
#[derive(Debug, Clone)]
pub struct SolarPv {
    /// Maximum power output in kilowatts under ideal conditions.
    pub kw_peak: f64,

    /// Hour of day when generation starts (inclusive).
    pub sunrise_hour: f64,

    /// Hour of day when generation stops (exclusive).
    pub sunset_hour: f64,

    /// Standard deviation of the Gaussian noise as a fraction of output.
    pub noise_std: f64,

    rng: StdRng,
}

impl SolarPv {
    /// Creates a new solar PV generator.
    ///
    /// # Panics
    ///
    /// Panics unless `0 <= sunrise_hour < sunset_hour <= 24`.
    pub fn new(kw_peak: f64, sunrise_hour: f64, sunset_hour: f64, noise_std: f64, seed: u64) -> Self {
        assert!(0.0 <= sunrise_hour && sunrise_hour < sunset_hour && sunset_hour <= 24.0);
        Self {
            kw_peak: kw_peak.max(0.0),
            sunrise_hour,
            sunset_hour,
            noise_std: noise_std.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Device for SolarPv {
    fn power_kw(&mut self, context: &DeviceContext) -> f64 {
        let frac = daylight_frac(context.hour_of_day(), self.sunrise_hour, self.sunset_hour);
        if frac <= 0.0 {
            return 0.0;
        }

        let noise_mult = 1.0 + gaussian_noise(&mut self.rng, self.noise_std);
        let kw = self.kw_peak * frac * noise_mult;

        -(kw.max(0.0))
    }

    fn device_type(&self) -> &'static str {
        "SolarPV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_hour(h: f64) -> DeviceContext {
        DeviceContext::new(h * 3600.0)
    }

    #[test]
    fn test_negative_kw_peak_clamped_to_zero() {
        let pv = SolarPv::new(-1.0, 6.0, 18.0, 0.05, 42);
        assert_eq!(pv.kw_peak, 0.0);
    }

    #[test]
    #[should_panic]
    fn test_sunset_before_sunrise_panics() {
        SolarPv::new(5.0, 18.0, 6.0, 0.05, 42);
    }

    #[test]
    fn test_no_generation_at_night() {
        let mut pv = SolarPv::new(5.0, 6.0, 18.0, 0.0, 42);
        assert_eq!(pv.power_kw(&at_hour(0.0)), 0.0);
        assert_eq!(pv.power_kw(&at_hour(5.5)), 0.0);
        assert_eq!(pv.power_kw(&at_hour(18.0)), 0.0);
        assert_eq!(pv.power_kw(&at_hour(23.0)), 0.0);
    }

    #[test]
    fn test_peak_generation_at_noon() {
        let mut pv = SolarPv::new(5.0, 6.0, 18.0, 0.0, 42);
        let noon = pv.power_kw(&at_hour(12.0));
        assert!(noon < -4.99 && noon >= -5.0);
    }

    #[test]
    fn test_solar_always_negative_or_zero() {
        let mut pv = SolarPv::new(5.0, 6.0, 18.0, 0.05, 42);
        for q in 0..192 {
            assert!(pv.power_kw(&at_hour(q as f64 * 0.25)) <= 0.0);
        }
    }

    #[test]
    fn test_deterministic_with_same_seed() {
        let mut pv1 = SolarPv::new(5.0, 6.0, 18.0, 0.1, 42);
        let mut pv2 = SolarPv::new(5.0, 6.0, 18.0, 0.1, 42);
        for h in 0..24 {
            assert_eq!(pv1.power_kw(&at_hour(h as f64)), pv2.power_kw(&at_hour(h as f64)));
        }
    }
}
