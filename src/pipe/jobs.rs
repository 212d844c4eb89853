//! Expanding merged samples into a flat list of QC jobs.

use std::path::PathBuf;
use super::{ReadDirection, ReadMode, MergedFileSet, Report};

/// Single QC tool invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QcJob {
    pub target: PathBuf,
    pub sample: String,
    pub read: ReadDirection,
}

/// Creates jobs for all requested read directions (R1 before R2).
/// Second returned value contains requested directions without a merged file.
pub fn build_jobs(files: &MergedFileSet, read_mode: ReadMode) -> (Vec<QcJob>, Vec<ReadDirection>) {
    let mut jobs = Vec::with_capacity(2);
    let mut skipped = Vec::new();
    for &read in read_mode.directions() {
        match files.get(read) {
            Some(path) => jobs.push(QcJob {
                target: path.to_owned(),
                sample: files.sample.clone(),
                read,
            }),
            None => skipped.push(read),
        }
    }
    (jobs, skipped)
}

/// Creates jobs for all samples in the manifest order. Skipped directions are recorded as warnings.
pub fn build_all(merged: &[(ReadMode, MergedFileSet)], report: &mut Report) -> Vec<QcJob> {
    let mut all_jobs = Vec::with_capacity(2 * merged.len());
    for (read_mode, files) in merged.iter() {
        let (jobs, skipped) = build_jobs(files, *read_mode);
        for read in skipped {
            report.add_warning(format!("Sample {}: no {} reads, skipping its QC", files.sample, read));
        }
        all_jobs.extend(jobs);
    }
    all_jobs
}
