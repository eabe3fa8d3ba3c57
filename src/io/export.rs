//! Result artifacts: per-step CSV time series and the TOML run summary.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use crate::error::{SimError, SimResult};
use crate::sim::engine::SimulationSummary;
use crate::sim::types::StepResult;

/// Time series file name inside a simulation directory.
pub const TIMESERIES_FILE: &str = "timeseries.csv";

/// Summary file name inside a simulation directory.
pub const SUMMARY_FILE: &str = "summary.toml";

/// Column header of `timeseries.csv`. Pressure columns stay empty for
/// storage without a gas sub-model.
const HEADER: &str = "timestep,time_s,load_kw,pv_kw,power_request_kw,setpoint_kw,\
                       storage_kw,grid_kw,soc,cathode_pressure_bar,h2_outflow_mol_per_s";

/// Exports simulation results to a CSV file at the given path.
///
/// Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns `SimError::Io` if the file cannot be created and `SimError::Csv`
/// if writing fails.
pub fn export_csv(results: &[StepResult], path: &Path) -> SimResult<()> {
    let file = File::create(path).map_err(|e| SimError::io(path, e))?;
    write_csv(results, io::BufWriter::new(file))
}

/// Writes simulation results as CSV to any writer.
///
/// # Errors
///
/// Returns `SimError::Csv` if writing fails.
pub fn write_csv(results: &[StepResult], writer: impl Write) -> SimResult<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    let optional = |v: Option<f64>, precision: usize| {
        v.map(|x| format!("{x:.precision$}")).unwrap_or_default()
    };
    for r in results {
        wtr.write_record(&[
            r.timestep.to_string(),
            format!("{:.0}", r.time_s),
            format!("{:.4}", r.load_kw),
            format!("{:.4}", r.pv_kw),
            format!("{:.4}", r.power_request_kw),
            format!("{:.4}", r.setpoint_kw),
            format!("{:.4}", r.storage_kw),
            format!("{:.4}", r.grid_kw),
            format!("{:.4}", r.soc),
            optional(r.cathode_pressure_bar, 4),
            optional(r.h2_outflow_mol_per_s, 8),
        ])?;
    }

    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes `summary` as TOML to `path`.
///
/// # Errors
///
/// Returns `SimError::Summary` if serialization fails and `SimError::Io` if
/// the file cannot be written.
pub fn write_summary(summary: &SimulationSummary, path: &Path) -> SimResult<()> {
    let text = toml::to_string(summary)?;
    fs::write(path, text).map_err(|e| SimError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_step(t: usize, pressure: Option<f64>) -> StepResult {
        StepResult {
            timestep: t,
            time_s: (t + 1) as f64 * 900.0,
            load_kw: 1.0,
            pv_kw: -2.5,
            power_request_kw: -1.5,
            setpoint_kw: 1.5,
            storage_kw: 1.4,
            grid_kw: -0.1,
            soc: 0.48,
            cathode_pressure_bar: pressure,
            h2_outflow_mol_per_s: pressure.map(|_| 0.001),
        }
    }

    fn lines(results: &[StepResult]) -> Vec<String> {
        let mut buf = Vec::new();
        write_csv(results, &mut buf).expect("in-memory write");
        String::from_utf8(buf)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn header_matches_schema() {
        let out = lines(&[make_step(0, None)]);
        assert_eq!(
            out[0],
            "timestep,time_s,load_kw,pv_kw,power_request_kw,setpoint_kw,\
             storage_kw,grid_kw,soc,cathode_pressure_bar,h2_outflow_mol_per_s"
        );
    }

    #[test]
    fn row_count_matches_step_count() {
        let results: Vec<StepResult> = (0..24).map(|t| make_step(t, None)).collect();
        // 1 header + 24 data rows
        assert_eq!(lines(&results).len(), 25);
    }

    #[test]
    fn pressure_columns_empty_without_gas_model() {
        let out = lines(&[make_step(0, None)]);
        assert!(out[1].ends_with(",,"));
        let out = lines(&[make_step(0, Some(12.0))]);
        assert!(out[1].contains(",12.0000,"));
    }

    #[test]
    fn deterministic_output() {
        let results: Vec<StepResult> = (0..5).map(|t| make_step(t, Some(3.0))).collect();
        assert_eq!(lines(&results), lines(&results));
    }

    #[test]
    fn rows_parse_back() {
        let results: Vec<StepResult> = (0..3).map(|t| make_step(t, Some(2.0))).collect();
        let mut buf = Vec::new();
        write_csv(&results, &mut buf).expect("in-memory write");

        let mut rdr = csv::ReaderBuilder::new().from_reader(buf.as_slice());
        let headers = rdr.headers().cloned().ok();
        assert_eq!(headers.as_ref().map(csv::StringRecord::len), Some(11));

        let mut row_count = 0;
        for record in rdr.records() {
            let rec = record.expect("every row should parse");
            for i in 1..11 {
                let val: Result<f64, _> = rec[i].parse();
                assert!(val.is_ok(), "column {i} should parse as f64");
            }
            row_count += 1;
        }
        assert_eq!(row_count, 3);
    }
}
