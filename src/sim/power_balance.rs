//! Grid power balance computation.

/// Computes the grid exchange from profile outputs and storage power.
///
/// All inputs must already follow the feeder sign convention:
/// - Positive = import / load (`BaseLoad`, storage charging)
/// - Negative = export / generation (`SolarPv`, storage discharging)
///
/// This function performs pure summation with **no sign flipping**.
pub fn grid_kw(load_kw: f64, pv_kw: f64, storage_kw: f64) -> f64 {
    power_request_kw(load_kw, pv_kw) + storage_kw
}

/// Net demand the storage is asked to cover (positive = deficit).
pub fn power_request_kw(load_kw: f64, pv_kw: f64) -> f64 {
    load_kw + pv_kw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_only_imports() {
        assert_eq!(grid_kw(1.5, 0.0, 0.0), 1.5);
    }

    #[test]
    fn solar_surplus_exports() {
        assert_eq!(grid_kw(1.0, -3.0, 0.0), -2.0);
    }

    #[test]
    fn charging_absorbs_surplus() {
        assert_eq!(grid_kw(1.0, -3.0, 2.0), 0.0);
    }

    #[test]
    fn discharge_covers_deficit() {
        assert!((grid_kw(2.0, -0.5, -1.5)).abs() < 1e-12);
    }
}
