//! ess-sim entry point: load a batch, apply CLI overrides, run it.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{Level, error};

use ess_sim::batch::{BatchScheduler, BatchSettings, FailurePolicy};
use ess_sim::config::BatchFile;

#[derive(Parser)]
#[command(name = "ess-sim")]
#[command(about = "Parallel energy storage system simulations", long_about = None)]
struct Cli {
    /// Load the batch from a TOML file
    #[arg(long, conflicts_with = "preset")]
    batch: Option<PathBuf>,
    /// Use a built-in batch (demo, hydrogen)
    #[arg(long, default_value = "demo")]
    preset: String,
    /// Maximum number of concurrently running jobs
    #[arg(long)]
    cores: Option<usize>,
    /// Output root directory
    #[arg(long)]
    output: Option<PathBuf>,
    /// Simulations assigned to one job
    #[arg(long)]
    per_job: Option<usize>,
    /// Simulations of a job run in parallel at a time
    #[arg(long)]
    sub_batch: Option<usize>,
    /// Cancel running jobs and skip the rest after the first failure
    #[arg(long)]
    abort_on_failure: bool,
    /// Increase diagnostic output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn load(&self) -> BatchFile {
        let loaded = match &self.batch {
            Some(path) => BatchFile::from_toml_file(path),
            None => BatchFile::from_preset(&self.preset),
        };
        let mut file = loaded.unwrap_or_else(|e| {
            eprintln!("error: {e}");
            process::exit(1);
        });

        let b = &mut file.batch;
        if let Some(cores) = self.cores {
            b.cores = cores;
        }
        if let Some(output) = &self.output {
            b.output_root.clone_from(output);
        }
        if let Some(n) = self.per_job {
            b.simulations_per_job = n;
        }
        if let Some(n) = self.sub_batch {
            b.sub_batch_size = n;
        }
        if self.abort_on_failure {
            b.failure_policy = FailurePolicy::AbortRemaining;
        }
        file
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let file = cli.load();
    let errors = file.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("error: {e}");
        }
        process::exit(1);
    }

    let scheduler = BatchScheduler::new(BatchSettings::from(&file.batch));
    match scheduler.run(file.simulation) {
        Ok(report) => println!("{report}"),
        Err(e) => {
            error!("batch not started: {e}");
            process::exit(1);
        }
    }
}
