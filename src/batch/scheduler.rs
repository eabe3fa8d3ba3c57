//! Batch entry point: validation, core-bounded admission and reporting.

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{BatchSection, NamedConfig, validate_simulations};
use crate::error::{ConfigError, SimResult};
use crate::sim::CancelToken;

use super::admission::AdmissionGauge;
use super::job::{Job, JobOutcome, JobStatus};
use super::log_sink::{LogSink, StopMode};

/// What the scheduler does with unstarted jobs once a job has failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep admitting jobs; failures are only reported.
    #[default]
    RunToCompletion,
    /// Stop admitting, cancel running simulations and skip the rest.
    AbortRemaining,
}

/// Runtime settings of a [`BatchScheduler`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    /// Maximum number of concurrently alive jobs.
    pub cores: usize,
    /// Directory holding one sub-directory per simulation.
    pub output_dir: PathBuf,
    pub simulations_per_job: usize,
    pub sub_batch_size: usize,
    pub poll_interval: Duration,
    pub failure_policy: FailurePolicy,
}

impl From<&BatchSection> for BatchSettings {
    fn from(b: &BatchSection) -> Self {
        Self {
            cores: b.cores,
            output_dir: b.output_root.join(&b.job_kind_dir),
            simulations_per_job: b.simulations_per_job,
            sub_batch_size: b.sub_batch_size,
            poll_interval: Duration::from_millis(b.poll_interval_ms),
            failure_policy: b.failure_policy,
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self::from(&BatchSection::default())
    }
}

impl BatchSettings {
    fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.cores == 0 {
            errors.push(ConfigError::new("batch.cores", "must be > 0"));
        }
        if self.simulations_per_job == 0 {
            errors.push(ConfigError::new("batch.simulations_per_job", "must be > 0"));
        }
        if self.sub_batch_size == 0 {
            errors.push(ConfigError::new("batch.sub_batch_size", "must be > 0"));
        }
        errors
    }
}

/// Aggregate result of one batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub total_wall_time: Duration,
    /// `total_wall_time / job_count`.
    pub average_per_job: Duration,
    pub job_count: usize,
    pub simulation_count: usize,
    /// Highest number of jobs alive at the same time.
    pub peak_alive_jobs: usize,
    /// One outcome per job, ordered by job id.
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failure())
    }

    pub fn skipped_jobs(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == JobStatus::Skipped)
            .count()
    }

    pub fn all_completed(&self) -> bool {
        self.outcomes.iter().all(|o| o.status == JobStatus::Completed)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Batch Report ---")?;
        writeln!(
            f,
            "Jobs:                  {} ({} simulations)",
            self.job_count, self.simulation_count
        )?;
        writeln!(
            f,
            "Total wall time:       {:.3} s",
            self.total_wall_time.as_secs_f64()
        )?;
        writeln!(
            f,
            "Average per job:       {:.3} s",
            self.average_per_job.as_secs_f64()
        )?;
        write!(f, "Peak concurrent jobs:  {}", self.peak_alive_jobs)?;
        for o in self.outcomes.iter().filter(|o| o.status != JobStatus::Completed) {
            write!(
                f,
                "\nJob {} [{}]: {}",
                o.job_id,
                o.simulations.join(", "),
                o.status
            )?;
        }
        Ok(())
    }
}

/// Runs a config set as core-bounded jobs.
///
/// Admission is cooperative polling: before each job starts, the scheduler
/// waits in `poll_interval` steps until fewer than `cores` jobs are alive.
/// Status lines from every job go through one [`LogSink`] owned by the run.
pub struct BatchScheduler {
    settings: BatchSettings,
    log_writer: Box<dyn Write + Send>,
}

impl BatchScheduler {
    /// Creates a scheduler logging status lines to stdout.
    pub fn new(settings: BatchSettings) -> Self {
        Self {
            settings,
            log_writer: Box::new(io::stdout()),
        }
    }

    /// Sends status lines to `writer` instead of stdout.
    pub fn with_log_writer<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.log_writer = Box::new(writer);
        self
    }

    /// Validates `configs`, runs them and waits for every job.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` before anything starts if the set is empty,
    /// a configuration is invalid or a name repeats. Job failures do not fail
    /// the batch; they are reported in [`BatchReport::outcomes`].
    pub fn run(self, configs: Vec<NamedConfig>) -> SimResult<BatchReport> {
        let mut errors = self.settings.validate();
        errors.extend(validate_simulations(&configs));
        if let Some(first) = errors.into_iter().next() {
            return Err(first.into());
        }

        let started = Instant::now();
        let settings = self.settings;
        let sink = LogSink::start(self.log_writer)?;
        let log = sink.handle();
        let cancel = CancelToken::new();
        let gauge = AdmissionGauge::default();
        let (results_tx, results_rx) = unbounded::<JobOutcome>();

        let simulation_count = configs.len();
        let groups: Vec<Vec<NamedConfig>> = configs
            .chunks(settings.simulations_per_job)
            .map(<[NamedConfig]>::to_vec)
            .collect();
        let job_count = groups.len();
        info!(
            jobs = job_count,
            simulations = simulation_count,
            cores = settings.cores,
            "batch started"
        );
        log.send(format!(
            "Starting {simulation_count} simulations in {job_count} jobs on {} cores",
            settings.cores
        ));

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(job_count);
        let mut outcomes = Vec::with_capacity(job_count);
        let mut aborted = false;

        for (id, group) in groups.into_iter().enumerate() {
            if !aborted {
                aborted = wait_for_slot(&settings, &handles, &results_rx, &mut outcomes);
                if aborted {
                    warn!(job = id, "job failed, skipping remaining jobs");
                    log.send("A job failed; remaining jobs are skipped");
                    cancel.cancel();
                }
            }
            if aborted {
                let names = group.into_iter().map(|c| c.name).collect();
                outcomes.push(JobOutcome::skipped(id, names));
                continue;
            }

            let job = Job::new(
                id,
                group,
                settings.output_dir.clone(),
                settings.sub_batch_size,
                log.clone(),
                cancel.clone(),
            )?;
            let names = job.names();
            debug!(job = id, alive = gauge.alive(), "admitting job");
            match job.spawn(results_tx.clone(), gauge.enter()) {
                Ok(handle) => handles.push(handle),
                Err(e) => outcomes.push(JobOutcome {
                    job_id: id,
                    simulations: names,
                    status: JobStatus::Failed(e.to_string()),
                    wall_time: Duration::ZERO,
                    summaries: Vec::new(),
                }),
            }
        }
        drop(results_tx);

        // Every job thread holds a sender until it exits.
        for outcome in results_rx.iter() {
            if settings.failure_policy == FailurePolicy::AbortRemaining
                && outcome.status.is_failure()
                && !cancel.is_cancelled()
            {
                warn!(job = outcome.job_id, "job failed, cancelling running jobs");
                log.send("A job failed; running jobs are cancelled");
                cancel.cancel();
            }
            outcomes.push(outcome);
        }
        for handle in handles {
            if handle.join().is_err() {
                warn!("job thread exited with an uncaught panic");
            }
        }
        outcomes.sort_by_key(|o| o.job_id);

        let total_wall_time = started.elapsed();
        let report = BatchReport {
            total_wall_time,
            average_per_job: total_wall_time / job_count.max(1) as u32,
            job_count,
            simulation_count,
            peak_alive_jobs: gauge.peak(),
            outcomes,
        };

        info!(
            total_s = report.total_wall_time.as_secs_f64(),
            average_s = report.average_per_job.as_secs_f64(),
            failed = report.failed_jobs().count(),
            "batch finished"
        );
        log.send(format!(
            "Finished {job_count} jobs in {:.3} s ({:.3} s per job)",
            report.total_wall_time.as_secs_f64(),
            report.average_per_job.as_secs_f64()
        ));
        drop(log);
        sink.stop(StopMode::Drain)?;
        Ok(report)
    }
}

/// Blocks until fewer than `cores` jobs are alive.
///
/// Collects finished outcomes while waiting and returns `true` when the
/// failure policy asks to abort.
fn wait_for_slot(
    settings: &BatchSettings,
    handles: &[JoinHandle<()>],
    results: &Receiver<JobOutcome>,
    outcomes: &mut Vec<JobOutcome>,
) -> bool {
    loop {
        // Count first: a finished job has already sent its outcome.
        let alive = handles.iter().filter(|h| !h.is_finished()).count();

        let before = outcomes.len();
        outcomes.extend(results.try_iter());
        if settings.failure_policy == FailurePolicy::AbortRemaining
            && outcomes[before..].iter().any(|o| o.status.is_failure())
        {
            return true;
        }

        if alive < settings.cores {
            return false;
        }
        thread::sleep(settings.poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchFile;
    use crate::error::SimError;

    #[test]
    fn settings_from_batch_section() {
        let section = BatchSection {
            cores: 3,
            output_root: PathBuf::from("out"),
            job_kind_dir: "kind".to_string(),
            poll_interval_ms: 25,
            ..BatchSection::default()
        };
        let s = BatchSettings::from(&section);
        assert_eq!(s.cores, 3);
        assert_eq!(s.output_dir, PathBuf::from("out").join("kind"));
        assert_eq!(s.poll_interval, Duration::from_millis(25));
        assert_eq!(s.failure_policy, FailurePolicy::RunToCompletion);
    }

    #[test]
    fn empty_set_is_a_config_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let settings = BatchSettings {
            output_dir: tmp.path().join("out"),
            ..BatchSettings::default()
        };
        let res = BatchScheduler::new(settings)
            .with_log_writer(io::sink())
            .run(Vec::new());
        assert!(matches!(res, Err(SimError::Config(ref e)) if e.field == "simulation"));
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn zero_cores_rejected() {
        let settings = BatchSettings {
            cores: 0,
            ..BatchSettings::default()
        };
        let res = BatchScheduler::new(settings)
            .with_log_writer(io::sink())
            .run(BatchFile::demo().simulation);
        assert!(matches!(res, Err(SimError::Config(ref e)) if e.field == "batch.cores"));
    }

    #[test]
    fn report_display_lists_failures() {
        let report = BatchReport {
            total_wall_time: Duration::from_secs(2),
            average_per_job: Duration::from_secs(1),
            job_count: 2,
            simulation_count: 2,
            peak_alive_jobs: 1,
            outcomes: vec![
                JobOutcome::skipped(1, vec!["b".to_string()]),
            ],
        };
        let text = report.to_string();
        assert!(text.contains("Jobs:                  2 (2 simulations)"));
        assert!(text.contains("Job 1 [b]: skipped"));
        assert_eq!(report.skipped_jobs(), 1);
        assert!(!report.all_completed());
    }
}
