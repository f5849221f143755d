//! Sequential batch execution with per-job failure isolation.

use crate::config::{MirrorJob, RunOptions};
use crate::error::MirrorError;
use crate::git::GitTransport;
use crate::mirror::MirrorExecutor;
use rust_i18n::t;
use tracing::debug;

#[derive(Debug)]
pub enum JobOutcome {
    Succeeded,
    Failed(MirrorError),
}

#[derive(Debug)]
pub struct JobResult {
    pub index: usize,
    pub name: String,
    pub target_url: String,
    pub source_url: String,
    pub outcome: JobOutcome,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Succeeded)
    }

    pub fn error(&self) -> Option<&MirrorError> {
        match &self.outcome {
            JobOutcome::Succeeded => None,
            JobOutcome::Failed(err) => Some(err),
        }
    }
}

/// Results in configured job order.
#[derive(Debug, Default)]
pub struct RunSummary {
    results: Vec<JobResult>,
}

impl RunSummary {
    pub fn results(&self) -> &[JobResult] {
        &self.results
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn record(mut self, result: JobResult) -> Self {
        self.results.push(result);
        self
    }
}

pub struct BatchRunner<T: GitTransport> {
    executor: MirrorExecutor<T>,
    options: RunOptions,
}

impl<T: GitTransport> BatchRunner<T> {
    pub fn new(executor: MirrorExecutor<T>, options: RunOptions) -> Self {
        Self { executor, options }
    }

    /// Execute every job in order. A failed job is recorded and the next one
    /// still runs; nothing is retried.
    pub fn run(&self, jobs: &[MirrorJob]) -> RunSummary {
        jobs.iter().fold(RunSummary::default(), |summary, job| {
            summary.record(self.run_job(job))
        })
    }

    fn run_job(&self, job: &MirrorJob) -> JobResult {
        if self.options.verbose {
            println!(
                "{}",
                t!(
                    "mirror.processing",
                    index = job.index.to_string(),
                    target = job.target.url.as_str(),
                    source = job.source.url.as_str()
                )
            );
        }

        let outcome = match self.executor.execute(job) {
            Ok(()) => {
                if self.options.verbose {
                    println!(
                        "{}",
                        t!(
                            "mirror.succeeded",
                            target = job.target.url.as_str(),
                            source = job.source.url.as_str()
                        )
                    );
                }
                JobOutcome::Succeeded
            }
            Err(err) => {
                debug!(job = %job.display_name(), stage = %err.stage(), "mirror job failed");
                eprintln!(
                    "{}",
                    t!(
                        "mirror.failed",
                        target = job.target.url.as_str(),
                        source = job.source.url.as_str(),
                        error = err.to_string()
                    )
                );
                JobOutcome::Failed(err)
            }
        };

        JobResult {
            index: job.index,
            name: job.display_name(),
            target_url: job.target.url.clone(),
            source_url: job.source.url.clone(),
            outcome,
        }
    }
}

pub fn print_summary(summary: &RunSummary) {
    println!(
        "{}",
        t!(
            "mirror.summary",
            succeeded = summary.succeeded().to_string(),
            total = summary.total().to_string(),
            failed = summary.failed().to_string()
        )
    );
    for result in summary.failures() {
        if let Some(err) = result.error() {
            println!(
                "{}",
                t!(
                    "mirror.summary_failure",
                    name = result.name.as_str(),
                    stage = err.stage().as_str(),
                    error = err.to_string()
                )
            );
        }
    }
}
