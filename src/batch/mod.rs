//! Parallel batch execution of named simulation configurations.
//!
//! A [`BatchScheduler`] splits a config set into [`Job`]s, admits at most
//! `cores` of them at a time and funnels their status lines through a single
//! [`LogSink`].

mod admission;
pub mod job;
pub mod log_sink;
pub mod scheduler;

pub use admission::{AdmissionGauge, AdmissionGuard};
pub use job::{Job, JobOutcome, JobStatus};
pub use log_sink::{LogHandle, LogSink, StopMode};
pub use scheduler::{BatchReport, BatchScheduler, BatchSettings, FailurePolicy};
