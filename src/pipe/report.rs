//! Accumulated warnings, errors and job results of a single run.

use std::time::Duration;
use colored::Colorize;
use crate::{
    ext,
    err::Error,
};
use super::{MergedFileSet, JobOutcome};

#[derive(Debug, Default)]
pub struct Report {
    n_samples: usize,
    warnings: Vec<String>,
    /// Non-fatal per-sample errors.
    errors: Vec<Error>,
    merged: Vec<MergedFileSet>,
    outcomes: Vec<JobOutcome>,
    elapsed: Duration,
}

impl Report {
    pub fn new(n_samples: usize) -> Self {
        Self {
            n_samples,
            ..Self::default()
        }
    }

    pub fn add_warning(&mut self, msg: String) {
        log::warn!("{}", msg);
        self.warnings.push(msg);
    }

    pub fn add_error(&mut self, e: Error) {
        log::error!("{}", e.display());
        self.errors.push(e);
    }

    pub fn set_merged(&mut self, merged: Vec<MergedFileSet>) {
        self.merged = merged;
    }

    pub fn set_outcomes(&mut self, outcomes: Vec<JobOutcome>) {
        self.outcomes = outcomes;
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn merged(&self) -> &[MergedFileSet] {
        &self.merged
    }

    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub fn n_succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.result.is_ok()).count()
    }

    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }

    /// True if all samples were merged and all QC jobs succeeded. Warnings are allowed.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }

    /// Prints summary of the run to stdout.
    pub fn print_summary(&self) {
        let n_failed = self.outcomes.len() - self.n_succeeded();
        println!("\n{}", "Summary:".bold());
        println!("    Samples:  {} in manifest, {} merged, {} failed", self.n_samples,
            self.merged.len(), self.errors.len());
        println!("    QC jobs:  {} succeeded, {}", self.n_succeeded().to_string().green(),
            if n_failed > 0 { format!("{} failed", n_failed).red() } else { "0 failed".normal() });
        println!("    Elapsed:  {}", ext::fmt::Duration(self.elapsed));

        if !self.warnings.is_empty() {
            println!("\n{}", format!("Warnings ({}):", self.warnings.len()).yellow().bold());
            for warning in self.warnings.iter() {
                println!("    {}", warning);
            }
        }
        if !self.errors.is_empty() {
            println!("\n{}", format!("Sample errors ({}):", self.errors.len()).red().bold());
            for e in self.errors.iter() {
                println!("    {}", e.display());
            }
        }
        if n_failed > 0 {
            println!("\n{}", format!("Failed QC jobs ({}):", n_failed).red().bold());
            for outcome in self.failed_jobs() {
                if let Err(e) = &outcome.result {
                    println!("    {} {}: {}", outcome.job.sample, outcome.job.read, e.display());
                }
            }
        }
        if self.is_success() {
            println!("\n{}", "Success!".green().bold());
        }
    }
}
