//! Physical constants used by the gas-pressure sub-model.
//!
//! Pressures inside the model are absolute and expressed in bar; the ideal-gas
//! update works in SI (Pa, m³, mol, K) and converts with [`PASCAL_PER_BAR`].

/// Universal gas constant, J/(mol·K).
pub const IDEAL_GAS_CONSTANT: f64 = 8.314_462_618;

/// Faraday constant, C/mol.
pub const FARADAY_CONSTANT: f64 = 96_485.332_12;

/// Electrons transferred per H2 molecule in water electrolysis.
pub const ELECTRONS_PER_H2: f64 = 2.0;

/// Moles of O2 evolved per mole of H2.
pub const O2_PER_H2: f64 = 0.5;

/// Pa per bar.
pub const PASCAL_PER_BAR: f64 = 1.0e5;

/// Standard atmosphere, bar (absolute). Lower bound for vessel pressure.
pub const AMBIENT_PRESSURE_BAR: f64 = 1.013_25;

/// Zero Celsius, K.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Lower heating value of hydrogen, kWh/mol (241.8 kJ/mol).
pub const HYDROGEN_LHV_KWH_PER_MOL: f64 = 241.8 / 3600.0;

/// Magnus formula prefactor, Pa.
pub const MAGNUS_PREFACTOR_PA: f64 = 610.94;

/// Magnus formula exponent coefficient, dimensionless.
pub const MAGNUS_COEFF_A: f64 = 17.625;

/// Magnus formula temperature offset, °C.
pub const MAGNUS_COEFF_B_C: f64 = 243.04;

/// Saturation vapor pressure of water at `temperature_k`, in bar.
pub fn saturation_pressure_bar(temperature_k: f64) -> f64 {
    let t_c = temperature_k - KELVIN_OFFSET;
    MAGNUS_PREFACTOR_PA * (MAGNUS_COEFF_A * t_c / (t_c + MAGNUS_COEFF_B_C)).exp() / PASCAL_PER_BAR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturation_pressure_near_reference_points() {
        // ~0.0317 bar at 25 °C, ~0.474 bar at 80 °C
        assert!((saturation_pressure_bar(298.15) - 0.0317).abs() < 1e-3);
        assert!((saturation_pressure_bar(353.15) - 0.474).abs() < 0.01);
    }

    #[test]
    fn lhv_in_kwh() {
        assert!((HYDROGEN_LHV_KWH_PER_MOL - 0.067_166).abs() < 1e-5);
    }
}
