//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ess_sim::batch::{BatchSettings, FailurePolicy};
use ess_sim::config::{GeneralConfig, NamedConfig, SimulationConfig};

/// Short simulation (hourly steps, one day, seed 42).
pub fn small_config() -> SimulationConfig {
    SimulationConfig {
        general: GeneralConfig {
            step_s: 3600,
            days: 1,
            ..GeneralConfig::default()
        },
        ..SimulationConfig::default()
    }
}

/// Named small configs `sim0`, `sim1`, ...
pub fn small_set(n: usize) -> Vec<NamedConfig> {
    (0..n)
        .map(|i| NamedConfig::new(format!("sim{i}"), small_config()))
        .collect()
}

/// Batch settings writing to `output_dir` with a short poll interval.
pub fn settings(output_dir: &Path, cores: usize) -> BatchSettings {
    BatchSettings {
        cores,
        output_dir: output_dir.to_path_buf(),
        simulations_per_job: 1,
        sub_batch_size: 1,
        poll_interval: Duration::from_millis(5),
        failure_policy: FailurePolicy::RunToCompletion,
    }
}

/// In-memory log writer readable after the sink has stopped.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
