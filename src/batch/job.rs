//! One isolated worker running a group of named simulations.

use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Barrier;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use crate::config::{NamedConfig, first_duplicate_name};
use crate::error::{ConfigError, SimError, SimResult, panic_message};
use crate::sim::{CancelToken, Simulation, SimulationSummary};

use super::admission::AdmissionGuard;
use super::log_sink::LogHandle;

/// Terminal state of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Every simulation finished and wrote its artifacts.
    Completed,
    /// A simulation returned an error; later groups were not started.
    Failed(String),
    /// The job thread panicked.
    Panicked(String),
    /// Never started because an earlier job failed under an abort policy.
    Skipped,
}

impl JobStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, JobStatus::Failed(_) | JobStatus::Panicked(_))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed(msg) => write!(f, "failed: {msg}"),
            JobStatus::Panicked(msg) => write!(f, "panicked: {msg}"),
            JobStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of one job as seen by the scheduler.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: usize,
    /// Simulation names in the job, in configuration order.
    pub simulations: Vec<String>,
    pub status: JobStatus,
    pub wall_time: Duration,
    /// Summaries of the simulations that completed.
    pub summaries: Vec<SimulationSummary>,
}

impl JobOutcome {
    pub fn skipped(job_id: usize, simulations: Vec<String>) -> Self {
        Self {
            job_id,
            simulations,
            status: JobStatus::Skipped,
            wall_time: Duration::ZERO,
            summaries: Vec::new(),
        }
    }
}

/// A group of simulations sharing one output directory and failure domain.
///
/// Each simulation owns `<output_dir>/<name>`, which is cleared before use.
/// With `sub_batch_size > 1`, simulations run in concurrent groups of that
/// size; the job waits for a whole group before starting the next.
#[derive(Debug)]
pub struct Job {
    id: usize,
    configs: Vec<NamedConfig>,
    output_dir: PathBuf,
    sub_batch_size: usize,
    log: LogHandle,
    cancel: CancelToken,
}

impl Job {
    /// # Errors
    ///
    /// Returns `SimError::Config` if `configs` is empty or `sub_batch_size`
    /// is zero.
    pub fn new(
        id: usize,
        configs: Vec<NamedConfig>,
        output_dir: impl Into<PathBuf>,
        sub_batch_size: usize,
        log: LogHandle,
        cancel: CancelToken,
    ) -> SimResult<Self> {
        if configs.is_empty() {
            return Err(ConfigError::new("simulation", "a job needs at least one simulation").into());
        }
        if sub_batch_size == 0 {
            return Err(ConfigError::new("batch.sub_batch_size", "must be > 0").into());
        }
        Ok(Self {
            id,
            configs,
            output_dir: output_dir.into(),
            sub_batch_size,
            log,
            cancel,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn names(&self) -> Vec<String> {
        self.configs.iter().map(|c| c.name.clone()).collect()
    }

    /// Directory owned by the simulation called `name`.
    pub fn simulation_dir(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Rejects duplicate simulation names.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` naming the first duplicate.
    pub fn check_unique_names(&self) -> SimResult<()> {
        match first_duplicate_name(self.configs.iter().map(|c| c.name.as_str())) {
            Some(dup) => Err(ConfigError::new(
                "simulation.name",
                format!("duplicate simulation name \"{dup}\" in job {}", self.id),
            )
            .into()),
            None => Ok(()),
        }
    }

    /// Prepares every directory, then runs the simulations group by group.
    ///
    /// # Errors
    ///
    /// Returns the first error of the failing group; later groups are not
    /// started. Duplicate names fail before the filesystem is touched.
    pub fn run(&self) -> SimResult<Vec<SimulationSummary>> {
        self.check_unique_names()?;

        let mut prepared = Vec::with_capacity(self.configs.len());
        for named in &self.configs {
            let dir = self.simulation_dir(&named.name);
            clear_dir(&dir)?;
            let sim = Simulation::from_config(&named.name, &named.config, self.cancel.clone())?;
            prepared.push((sim, dir));
        }

        let mut summaries = Vec::with_capacity(prepared.len());
        for group in prepared.chunks_mut(self.sub_batch_size) {
            if self.cancel.is_cancelled() {
                let name = group.first().map(|(s, _)| s.name().to_string()).unwrap_or_default();
                return Err(SimError::Cancelled { name, time_s: 0.0 });
            }
            for result in self.run_group(group) {
                summaries.push(result?);
            }
        }
        Ok(summaries)
    }

    fn run_group(&self, group: &mut [(Simulation, PathBuf)]) -> Vec<SimResult<SimulationSummary>> {
        if let [(sim, dir)] = &mut *group {
            return vec![self.run_one(sim, dir, None)];
        }
        // Nobody in the group runs until everybody has started.
        let ready = Barrier::new(group.len());
        thread::scope(|scope| {
            let handles: Vec<_> = group
                .iter_mut()
                .map(|(sim, dir)| {
                    let name = sim.name().to_string();
                    let ready = &ready;
                    (name, scope.spawn(move || self.run_one(sim, dir, Some(ready))))
                })
                .collect();
            handles
                .into_iter()
                .map(|(name, handle)| {
                    handle.join().unwrap_or_else(|payload| {
                        Err(SimError::Panicked {
                            name,
                            message: panic_message(payload.as_ref()),
                        })
                    })
                })
                .collect()
        })
    }

    fn run_one(
        &self,
        sim: &mut Simulation,
        dir: &Path,
        ready: Option<&Barrier>,
    ) -> SimResult<SimulationSummary> {
        self.log
            .send(format!("[job {}] {}: started", self.id, sim.name()));
        if let Some(ready) = ready {
            ready.wait();
        }
        match sim.run_to_dir(dir) {
            Ok(summary) => {
                self.log.send(format!(
                    "[job {}] {}: finished in {:.3} s",
                    self.id, summary.name, summary.wall_time_s
                ));
                Ok(summary)
            }
            Err(e) => {
                self.log
                    .send(format!("[job {}] {}: failed: {e}", self.id, sim.name()));
                Err(e)
            }
        }
    }

    /// Runs the job, turning errors and panics into a [`JobOutcome`].
    pub fn execute(self) -> JobOutcome {
        let started = Instant::now();
        let simulations = self.names();
        info!(job = self.id, simulations = simulations.len(), "job started");

        let (status, summaries) = match panic::catch_unwind(AssertUnwindSafe(|| self.run())) {
            Ok(Ok(summaries)) => (JobStatus::Completed, summaries),
            Ok(Err(e)) => {
                warn!(job = self.id, error = %e, "job failed");
                (JobStatus::Failed(e.to_string()), Vec::new())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(job = self.id, %message, "job panicked");
                (JobStatus::Panicked(message), Vec::new())
            }
        };

        let wall_time = started.elapsed();
        debug!(job = self.id, ?wall_time, "job finished");
        JobOutcome {
            job_id: self.id,
            simulations,
            status,
            wall_time,
            summaries,
        }
    }

    /// Starts the job on its own named thread.
    ///
    /// The outcome is sent on `results`; `slot` is released when the thread
    /// is about to exit.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Io` if the thread cannot be spawned.
    pub fn spawn(
        self,
        results: Sender<JobOutcome>,
        slot: AdmissionGuard,
    ) -> SimResult<JoinHandle<()>> {
        let name = format!("job-{}", self.id);
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let outcome = self.execute();
                let _ = results.send(outcome);
                drop(slot);
            })
            .map_err(|e| SimError::io(name, e))
    }
}

/// Removes `dir` with all its content if present, then recreates it empty.
fn clear_dir(dir: &Path) -> SimResult<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| SimError::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| SimError::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::log_sink::{LogSink, StopMode};
    use crate::config::SimulationConfig;

    fn named(name: &str) -> NamedConfig {
        NamedConfig::new(name, SimulationConfig::default())
    }

    fn job(configs: Vec<NamedConfig>, dir: &Path, sub_batch: usize, sink: &LogSink) -> Job {
        Job::new(0, configs, dir, sub_batch, sink.handle(), CancelToken::new()).expect("valid job")
    }

    #[test]
    fn empty_job_rejected() {
        let sink = LogSink::start(std::io::sink()).expect("sink");
        let res = Job::new(0, Vec::new(), "out", 1, sink.handle(), CancelToken::new());
        assert!(matches!(res, Err(SimError::Config(_))));
    }

    #[test]
    fn duplicate_names_fail_before_touching_disk() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let out = tmp.path().join("jobs");
        let sink = LogSink::start(std::io::sink()).expect("sink");
        let j = job(vec![named("a"), named("b"), named("a")], &out, 1, &sink);
        assert!(matches!(j.run(), Err(SimError::Config(_))));
        assert!(!out.exists());
    }

    #[test]
    fn stale_directory_content_is_removed() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let stale = tmp.path().join("a").join("stale.txt");
        fs::create_dir_all(tmp.path().join("a")).expect("mkdir");
        fs::write(&stale, "old").expect("write");

        let sink = LogSink::start(std::io::sink()).expect("sink");
        let j = job(vec![named("a")], tmp.path(), 1, &sink);
        j.run().expect("run");
        assert!(!stale.exists());
        assert!(tmp.path().join("a").join("timeseries.csv").is_file());
    }

    #[test]
    fn sub_batches_produce_every_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let sink = LogSink::start(std::io::sink()).expect("sink");
        let names = ["s1", "s2", "s3", "s4", "s5"];
        let j = job(names.iter().map(|n| named(n)).collect(), tmp.path(), 2, &sink);
        let summaries = j.run().expect("run");
        assert_eq!(summaries.len(), 5);
        for n in names {
            assert!(tmp.path().join(n).join("summary.toml").is_file(), "{n}");
        }
    }

    #[test]
    fn groups_start_together_and_run_one_after_another() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let log_path = tmp.path().join("log.txt");
        let sink = LogSink::start(fs::File::create(&log_path).expect("log file")).expect("sink");
        let names = ["s1", "s2", "s3", "s4", "s5"];
        let j = job(
            names.iter().map(|n| named(n)).collect(),
            &tmp.path().join("out"),
            2,
            &sink,
        );
        assert_eq!(j.execute().status, JobStatus::Completed);
        sink.stop(StopMode::Drain).expect("stop");

        let log = fs::read_to_string(&log_path).expect("read log");
        let lines: Vec<&str> = log.lines().collect();
        let at = |name: &str, event: &str| {
            let prefix = format!("[job 0] {name}: {event}");
            lines
                .iter()
                .position(|l| l.starts_with(&prefix))
                .unwrap_or_else(|| panic!("missing `{prefix}`"))
        };

        for pair in [["s1", "s2"], ["s3", "s4"]] {
            let last_start = at(pair[0], "started").max(at(pair[1], "started"));
            let first_finish = at(pair[0], "finished").min(at(pair[1], "finished"));
            assert!(last_start < first_finish, "{pair:?} overlap");
        }
        let group_done = |a: &str, b: &str| at(a, "finished").max(at(b, "finished"));
        assert!(group_done("s1", "s2") < at("s3", "started"));
        assert!(group_done("s3", "s4") < at("s5", "started"));
    }

    #[test]
    fn execute_reports_failure_as_outcome() {
        let tmp = tempfile::tempdir().expect("tempdir");
        // A regular file where the simulation directory should go.
        fs::write(tmp.path().join("blocked"), "x").expect("write");
        let sink = LogSink::start(std::io::sink()).expect("sink");
        let outcome = job(vec![named("blocked")], tmp.path(), 1, &sink).execute();
        assert!(outcome.status.is_failure());
        assert_eq!(outcome.simulations, vec!["blocked".to_string()]);
        assert!(outcome.summaries.is_empty());
    }

    #[test]
    fn status_lines_reach_the_sink() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let log_path = tmp.path().join("log.txt");
        let file = fs::File::create(&log_path).expect("log file");
        let sink = LogSink::start(file).expect("sink");
        let j = job(vec![named("x")], &tmp.path().join("out"), 1, &sink);
        assert_eq!(j.execute().status, JobStatus::Completed);
        sink.stop(StopMode::Drain).expect("stop");
        let log = fs::read_to_string(&log_path).expect("read log");
        assert!(log.contains("[job 0] x: started"));
        assert!(log.contains("[job 0] x: finished"));
    }
}
