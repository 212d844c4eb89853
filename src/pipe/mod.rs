//! Lane merging and parallel quality control of sequencing samples.
//!
//! A run consists of strictly sequential phases: manifest parsing, lane merging, job construction,
//! QC dispatch and reporting. Each phase completes (collecting per-sample and per-job errors) before
//! the next one starts.

pub mod manifest;
pub mod lanes;
pub mod jobs;
pub mod dispatch;
pub mod report;

use std::{
    fmt,
    fs,
    str::FromStr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use crate::{
    ext,
    err::add_path,
};
pub use manifest::SampleDescriptor;
pub use lanes::MergedFileSet;
pub use jobs::QcJob;
pub use dispatch::{ToolRunner, ToolOutput, FastqcRunner, JobOutcome};
pub use report::Report;

/// Single read direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadDirection {
    R1,
    R2,
}

impl ReadDirection {
    pub fn number(self) -> u8 {
        match self {
            Self::R1 => 1,
            Self::R2 => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::R1),
            2 => Some(Self::R2),
            _ => None,
        }
    }
}

impl fmt::Display for ReadDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "R{}", self.number())
    }
}

/// Which read directions are analyzed for a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    R1,
    R2,
    Both,
}

impl ReadMode {
    /// Read directions in the order of processing.
    pub fn directions(self) -> &'static [ReadDirection] {
        match self {
            Self::R1 => &[ReadDirection::R1],
            Self::R2 => &[ReadDirection::R2],
            Self::Both => &[ReadDirection::R1, ReadDirection::R2],
        }
    }
}

impl FromStr for ReadMode {
    type Err = String;

    /// Numeric tokens count read directions (`1`: first reads only, `2`: both reads),
    /// named tokens select directions explicitly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &s.to_lowercase() as &str {
            "1" | "r1" => Ok(Self::R1),
            "r2" => Ok(Self::R2),
            "2" | "both" | "b" | "12" | "r1r2" | "paired" => Ok(Self::Both),
            _ => Err(format!("Unknown read mode '{}' (expected 1, 2, R1, R2 or Both)", s)),
        }
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::R1 => "R1",
            Self::R2 => "R2",
            Self::Both => "R1+R2",
        })
    }
}

/// Maximal number of simultaneously running QC jobs.
pub const MAX_THREADS: u16 = 12;

/// Clamps requested number of threads into `[1, MAX_THREADS]`.
pub fn clamp_threads(requested: i64) -> u16 {
    requested.clamp(1, i64::from(MAX_THREADS)) as u16
}

/// Parameters of a single pipeline run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of QC jobs, running at the same time. Always within `[1, MAX_THREADS]`.
    pub threads: u16,
    /// Merged FASTQ files are written here.
    pub merge_dir: PathBuf,
    /// Remove merged files after QC.
    pub clean: bool,
}

impl Config {
    pub fn new(threads: i64, merge_dir: PathBuf) -> Self {
        Self {
            threads: clamp_threads(threads),
            merge_dir,
            clean: false,
        }
    }
}

/// Merges lane files of all samples, one sample at a time.
/// Returns merged files together with the read mode of the corresponding sample.
///
/// Every manifest row produces its own merged files, even if several rows share the sample name.
fn merge_samples(
    samples: &[SampleDescriptor],
    merge_dir: &Path,
    report: &mut Report,
) -> crate::Result<Vec<(ReadMode, MergedFileSet)>>
{
    let prefixes = lanes::output_prefixes(samples);
    let merger = lanes::Merger::new(merge_dir, &prefixes)?;
    let mut merged = Vec::with_capacity(samples.len());
    for (sample, prefix) in samples.iter().zip(&prefixes) {
        if *prefix != sample.name {
            log::info!("    Merging {} ({}, line {}) as {}", sample.name, sample.read_mode, sample.line, prefix);
        } else {
            log::info!("    Merging {} ({})", sample.name, sample.read_mode);
        }
        match merger.merge_sample(sample, prefix) {
            Ok(files) => merged.push((sample.read_mode, files)),
            Err(e) => report.add_error(e),
        }
    }
    Ok(merged)
}

/// Removes merged files, failure to remove a file only produces a warning.
fn remove_merged(merged: &[(ReadMode, MergedFileSet)], report: &mut Report) {
    for (_, files) in merged.iter() {
        for path in files.paths() {
            log::debug!("    Removing {}", ext::fmt::path(path));
            if let Err(e) = fs::remove_file(path) {
                report.add_warning(format!("Could not remove {}: {}", ext::fmt::path(path), e));
            }
        }
    }
}

/// Runs the whole pipeline: parse the manifest, merge lanes, build and dispatch QC jobs.
///
/// Only fatal errors (unreadable or malformed manifest, impossible merge directory) are returned as `Err`,
/// all other errors are accumulated in the report.
pub fn run(manifest_path: &Path, config: &Config, runner: Arc<dyn ToolRunner>) -> crate::Result<Report> {
    let timer = Instant::now();
    log::info!("Reading manifest {}", ext::fmt::path(manifest_path));
    let samples = manifest::load(manifest_path)?;
    let mut report = Report::new(samples.len());
    log::info!("Loaded {}", ext::fmt::count(samples.len(), "sample"));

    ext::sys::mkdir(&config.merge_dir).map_err(add_path!(config.merge_dir))?;
    log::info!("Merging lane files into {}", ext::fmt::path(&config.merge_dir));
    let merged = merge_samples(&samples, &config.merge_dir, &mut report)?;

    let jobs = jobs::build_all(&merged, &mut report);
    log::info!("Running QC on {} in {} threads", ext::fmt::count(jobs.len(), "file"),
        usize::from(config.threads).min(jobs.len()));
    let outcomes = dispatch::dispatch(jobs, config.threads, runner);
    report.set_outcomes(outcomes);

    if config.clean {
        log::info!("Cleaning merged files");
        remove_merged(&merged, &mut report);
    }
    report.set_merged(merged.into_iter().map(|(_, files)| files).collect());
    report.set_elapsed(timer.elapsed());
    Ok(report)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{
        path::PathBuf,
        sync::Mutex,
    };
    use crate::Error;
    use pretty_assertions::assert_eq;

    /// Records all targets and fails on files, whose name contains `fail_on`.
    struct RecordingRunner {
        fail_on: Option<&'static str>,
        targets: Mutex<Vec<PathBuf>>,
    }

    impl ToolRunner for RecordingRunner {
        fn run(&self, target: &Path) -> Result<ToolOutput, Error> {
            self.targets.lock().unwrap().push(target.to_owned());
            let fail = self.fail_on.map_or(false, |s| target.to_string_lossy().contains(s));
            Ok(ToolOutput {
                code: Some(if fail { 1 } else { 0 }),
                stdout: Vec::new(),
                stderr: if fail { b"bad file".to_vec() } else { Vec::new() },
            })
        }
    }

    fn runner(fail_on: Option<&'static str>) -> Arc<RecordingRunner> {
        Arc::new(RecordingRunner { fail_on, targets: Mutex::new(Vec::new()) })
    }

    #[test]
    fn read_modes() {
        assert_eq!("1".parse::<ReadMode>(), Ok(ReadMode::R1));
        assert_eq!("r2".parse::<ReadMode>(), Ok(ReadMode::R2));
        assert_eq!("BOTH".parse::<ReadMode>(), Ok(ReadMode::Both));
        assert_eq!("2".parse::<ReadMode>(), Ok(ReadMode::Both));
        assert!("3".parse::<ReadMode>().is_err());
        assert_eq!(ReadMode::Both.directions(), &[ReadDirection::R1, ReadDirection::R2]);
    }

    #[test]
    fn thread_clamping() {
        assert_eq!(clamp_threads(0), 1);
        assert_eq!(clamp_threads(-5), 1);
        assert_eq!(clamp_threads(4), 4);
        assert_eq!(clamp_threads(12), 12);
        assert_eq!(clamp_threads(100), 12);
        assert_eq!(Config::new(64, PathBuf::from("m")).threads, MAX_THREADS);
    }

    #[test]
    fn end_to_end_single_direction() -> Result<(), Error> {
        let root = tempfile::tempdir()?;
        let dir1 = root.path().join("dir1");
        fs::create_dir(&dir1)?;
        fs::write(dir1.join("SampleA_L001_R1_001.fastq"), "AAAA")?;
        fs::write(dir1.join("SampleA_L002_R1_001.fastq"), "BBBB")?;
        let manifest = root.path().join("manifest.tsv");
        fs::write(&manifest, "dir1\tSampleA\t2\n")?;

        let merge_dir = root.path().join("merged");
        let config = Config::new(4, merge_dir.clone());
        let stub = runner(None);
        let report = run(&manifest, &config, stub.clone())?;

        let merged = merge_dir.join("SampleA_R1.fastq");
        assert_eq!(fs::read_to_string(&merged)?, "AAAABBBB");
        assert!(!merge_dir.join("SampleA_R2.fastq").exists());
        assert_eq!(*stub.targets.lock().unwrap(), vec![merged]);
        assert_eq!(report.n_succeeded(), 1);
        assert_eq!(report.warnings().len(), 1);
        assert!(report.errors().is_empty());
        assert!(report.is_success());
        Ok(())
    }

    #[test]
    fn partial_failures() -> Result<(), Error> {
        let root = tempfile::tempdir()?;
        let data = root.path().join("data");
        fs::create_dir(&data)?;
        for sample in ["S1", "S2"] {
            for read in [1, 2] {
                fs::write(data.join(format!("{}_L001_R{}_001.fastq", sample, read)), format!("{}{}", sample, read))?;
            }
        }
        let manifest = root.path().join("manifest.tsv");
        fs::write(&manifest, "# dir\tsample\treads\n\
            data\tS1\tBoth\n\
            missing\tS3\tR1\n\
            data\tS2\tboth\n\
            data\tS4\t1\n")?;

        let mut config = Config::new(2, root.path().join("merged"));
        config.clean = true;
        let stub = runner(Some("S1_R2"));
        let report = run(&manifest, &config, stub.clone())?;

        assert_eq!(stub.targets.lock().unwrap().len(), 4);
        assert_eq!(report.n_succeeded(), 3);
        let failed: Vec<_> = report.failed_jobs().map(|outcome| outcome.job.target.clone()).collect();
        assert_eq!(failed, vec![root.path().join("merged").join("S1_R2.fastq")]);
        // Missing directory of S3 and no lane files for S4.
        assert_eq!(report.errors().len(), 2);
        assert!(matches!(report.errors()[0], Error::SampleDirMissing(..)));
        assert!(matches!(report.errors()[1], Error::LaneFilesNotFound(..)));
        assert!(!report.is_success());
        // Merged files were cleaned.
        assert!(!root.path().join("merged").join("S2_R1.fastq").exists());
        Ok(())
    }

    #[test]
    fn malformed_manifest_is_fatal() -> Result<(), Error> {
        let root = tempfile::tempdir()?;
        let manifest = root.path().join("manifest.tsv");
        fs::write(&manifest, "data\tS1\tBoth\ndata\tS2\tR3\n")?;
        let stub = runner(None);
        let res = run(&manifest, &Config::new(2, root.path().to_owned()), stub.clone());
        assert!(matches!(res, Err(Error::ManifestParse(2, _))));
        assert!(stub.targets.lock().unwrap().is_empty());
        Ok(())
    }

    #[test]
    fn repeated_sample_names() -> Result<(), Error> {
        let root = tempfile::tempdir()?;
        for run in ["run1", "run2"] {
            fs::create_dir(root.path().join(run))?;
            fs::write(root.path().join(run).join("S_L001_R1_001.fastq"), run.to_uppercase())?;
        }
        let manifest = root.path().join("manifest.tsv");
        fs::write(&manifest, "run1\tS\t1\nrun2\tS\t1\n")?;

        let merge_dir = root.path().join("merged");
        let stub = runner(None);
        let report = run(&manifest, &Config::new(2, merge_dir.clone()), stub.clone())?;
        assert!(report.is_success());

        let mut targets = stub.targets.lock().unwrap().clone();
        targets.sort();
        assert_eq!(targets, vec![merge_dir.join("S_line1_R1.fastq"), merge_dir.join("S_line2_R1.fastq")]);
        assert_eq!(fs::read_to_string(&targets[0])?, "RUN1");
        assert_eq!(fs::read_to_string(&targets[1])?, "RUN2");
        assert!(!merge_dir.join("S_R1.fastq").exists());
        Ok(())
    }

    #[test]
    fn merge_into_source_dir() -> Result<(), Error> {
        let root = tempfile::tempdir()?;
        fs::write(root.path().join("X_L2_L001_R1_001.fastq"), "X_L2")?;
        fs::write(root.path().join("X_L001_R1_001.fastq"), "X1")?;
        let manifest = root.path().join("manifest.tsv");
        fs::write(&manifest, ".\tX_L2\t1\n.\tX\t1\n")?;

        // Merged files are written next to the lane files.
        let stub = runner(None);
        let report = run(&manifest, &Config::new(1, root.path().to_owned()), stub.clone())?;
        assert!(report.is_success());
        assert_eq!(fs::read_to_string(root.path().join("X_L2_R1.fastq"))?, "X_L2");
        assert_eq!(fs::read_to_string(root.path().join("X_R1.fastq"))?, "X1");

        // Rerun does not pick up merged files of the previous run.
        run(&manifest, &Config::new(1, root.path().to_owned()), stub.clone())?;
        assert_eq!(fs::read_to_string(root.path().join("X_R1.fastq"))?, "X1");
        Ok(())
    }
}
