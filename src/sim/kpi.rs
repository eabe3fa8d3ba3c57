//! Post-hoc KPI computation from simulation results.

use std::fmt;

use serde::Serialize;

use super::types::StepResult;

/// Aggregate key performance indicators derived from a complete simulation run.
///
/// Computed post-hoc from `Vec<StepResult>` to ensure consistency between
/// step data and reported metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiReport {
    /// Peak grid import power (kW, positive).
    pub peak_import_kw: f64,
    /// Peak grid export power (kW, positive magnitude).
    pub peak_export_kw: f64,
    /// Energy imported from the grid (kWh).
    pub grid_import_kwh: f64,
    /// Energy exported to the grid (kWh, positive magnitude).
    pub grid_export_kwh: f64,
    /// Total storage energy throughput (kWh, sum of |power| * dt).
    pub storage_throughput_kwh: f64,
    /// Storage equivalent full cycles (throughput / 2*capacity).
    pub equivalent_full_cycles: f64,
    /// Share of PV generation not exported (0.0 to 1.0).
    pub self_consumption_ratio: f64,
    /// SOC after the last step.
    pub final_soc: f64,
    /// Highest cathode pressure seen (hydrogen storage only), bar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cathode_pressure_bar: Option<f64>,
}

impl KpiReport {
    /// Computes all KPIs from the complete step record vector.
    ///
    /// # Arguments
    ///
    /// * `results` - Complete simulation step results
    /// * `dt_hours` - Timestep duration in hours
    /// * `capacity_kwh` - Storage capacity for cycle calculation
    pub fn from_results(results: &[StepResult], dt_hours: f64, capacity_kwh: f64) -> Self {
        let mut peak_import = 0.0_f64;
        let mut peak_export = 0.0_f64;
        let mut import_kwh = 0.0;
        let mut export_kwh = 0.0;
        let mut throughput = 0.0;
        let mut pv_kwh = 0.0;
        let mut max_pressure: Option<f64> = None;

        for r in results {
            peak_import = peak_import.max(r.grid_kw);
            peak_export = peak_export.max(-r.grid_kw);
            if r.grid_kw > 0.0 {
                import_kwh += r.grid_kw * dt_hours;
            } else {
                export_kwh -= r.grid_kw * dt_hours;
            }
            throughput += r.storage_kw.abs() * dt_hours;
            pv_kwh -= r.pv_kw.min(0.0) * dt_hours;
            if let Some(p) = r.cathode_pressure_bar {
                max_pressure = Some(max_pressure.map_or(p, |m| m.max(p)));
            }
        }

        let cycles = if capacity_kwh > 0.0 {
            throughput / (2.0 * capacity_kwh)
        } else {
            0.0
        };

        let self_consumption_ratio = if pv_kwh > 0.0 {
            (1.0 - export_kwh / pv_kwh).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            peak_import_kw: peak_import,
            peak_export_kw: peak_export,
            grid_import_kwh: import_kwh,
            grid_export_kwh: export_kwh,
            storage_throughput_kwh: throughput,
            equivalent_full_cycles: cycles,
            self_consumption_ratio,
            final_soc: results.last().map_or(0.0, |r| r.soc),
            max_cathode_pressure_bar: max_pressure,
        }
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Peak import:           {:.2} kW", self.peak_import_kw)?;
        writeln!(f, "Peak export:           {:.2} kW", self.peak_export_kw)?;
        writeln!(
            f,
            "Grid energy:           {:.2} kWh in / {:.2} kWh out",
            self.grid_import_kwh, self.grid_export_kwh
        )?;
        writeln!(
            f,
            "Storage throughput:    {:.2} kWh ({:.2} equiv. cycles)",
            self.storage_throughput_kwh, self.equivalent_full_cycles
        )?;
        writeln!(
            f,
            "Self-consumption:      {:.1}%",
            self.self_consumption_ratio * 100.0
        )?;
        write!(f, "Final SoC:             {:.1}%", self.final_soc * 100.0)?;
        if let Some(p) = self.max_cathode_pressure_bar {
            write!(f, "\nMax H2 pressure:       {p:.2} bar")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_result(storage_kw: f64, grid_kw: f64) -> StepResult {
        StepResult {
            timestep: 0,
            time_s: 0.0,
            load_kw: 0.0,
            pv_kw: 0.0,
            power_request_kw: 0.0,
            setpoint_kw: storage_kw,
            storage_kw,
            grid_kw,
            soc: 0.5,
            cathode_pressure_bar: None,
            h2_outflow_mol_per_s: None,
        }
    }

    #[test]
    fn storage_throughput() {
        // storage powers: [2.0, -3.0, 1.0, -1.0], dt=1.0
        // throughput = 2 + 3 + 1 + 1 = 7.0 kWh
        let results: Vec<StepResult> = [2.0, -3.0, 1.0, -1.0]
            .iter()
            .map(|&b| make_result(b, 0.0))
            .collect();
        let kpi = KpiReport::from_results(&results, 1.0, 10.0);
        assert!((kpi.storage_throughput_kwh - 7.0).abs() < 1e-9);
        assert!((kpi.equivalent_full_cycles - 0.35).abs() < 1e-9);
    }

    #[test]
    fn peak_import_and_export() {
        let results: Vec<StepResult> = [3.0, -2.0, 5.0, -1.0]
            .iter()
            .map(|&g| make_result(0.0, g))
            .collect();
        let kpi = KpiReport::from_results(&results, 0.5, 10.0);
        assert_eq!(kpi.peak_import_kw, 5.0);
        assert_eq!(kpi.peak_export_kw, 2.0);
        assert!((kpi.grid_import_kwh - 4.0).abs() < 1e-9);
        assert!((kpi.grid_export_kwh - 1.5).abs() < 1e-9);
    }

    #[test]
    fn self_consumption_from_pv_and_export() {
        let mut r = make_result(0.0, -1.0);
        r.pv_kw = -4.0;
        let kpi = KpiReport::from_results(&[r], 1.0, 10.0);
        assert!((kpi.self_consumption_ratio - 0.75).abs() < 1e-9);
    }

    #[test]
    fn max_pressure_only_for_hydrogen() {
        let plain = KpiReport::from_results(&[make_result(0.0, 0.0)], 1.0, 10.0);
        assert_eq!(plain.max_cathode_pressure_bar, None);

        let mut a = make_result(1.0, 0.0);
        a.cathode_pressure_bar = Some(5.0);
        let mut b = a.clone();
        b.cathode_pressure_bar = Some(12.0);
        let kpi = KpiReport::from_results(&[a, b], 1.0, 10.0);
        assert_eq!(kpi.max_cathode_pressure_bar, Some(12.0));
    }

    #[test]
    fn empty_results() {
        let kpi = KpiReport::from_results(&[], 1.0, 10.0);
        assert_eq!(kpi.peak_import_kw, 0.0);
        assert_eq!(kpi.final_soc, 0.0);
        assert!(kpi.equivalent_full_cycles.is_finite());
    }
}
