//! Merge lanes and run FastQC on all samples from the manifest.

use std::{
    path::PathBuf,
    sync::Arc,
};
use colored::Colorize;
use const_format::str_repeat;
use crate::{
    ext,
    err::{validate_param, add_path},
    pipe::{self, Config, FastqcRunner, MAX_THREADS},
};

struct Args {
    manifest: Option<PathBuf>,
    merge_dir: Option<PathBuf>,
    qc_dir: Option<PathBuf>,
    threads: i64,
    clean: bool,
    verbose: bool,
    log_file: PathBuf,
    fastqc: PathBuf,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            manifest: None,
            merge_dir: None,
            qc_dir: None,
            threads: 4,
            clean: false,
            verbose: false,
            log_file: PathBuf::from(concat!(env!("CARGO_PKG_NAME"), ".log")),
            fastqc: PathBuf::from("fastqc"),
        }
    }
}

impl Args {
    /// Validate arguments, modifying some, if needed.
    fn validate(mut self) -> crate::Result<Self> {
        validate_param!(self.manifest.is_some(), "Manifest is not provided (see -f/--file)");
        let clamped = i64::from(pipe::clamp_threads(self.threads));
        if clamped != self.threads {
            log::warn!("Number of threads ({}) must be within [1, {}], using {}", self.threads, MAX_THREADS, clamped);
            self.threads = clamped;
        }
        if let Ok(available) = std::thread::available_parallelism() {
            if usize::try_from(self.threads).map_or(false, |threads| threads > available.get()) {
                log::warn!("Requested {} threads, but only {} are available", self.threads, available);
            }
        }
        self.fastqc = ext::sys::find_exe(&self.fastqc)?;
        log::debug!("FastQC executable: {}", ext::fmt::path(&self.fastqc));
        Ok(self)
    }

    /// Builds run configuration. Merge directory defaults to the directory of the manifest.
    fn config(&self) -> Config {
        // unwrap as manifest was previously checked to be Some.
        let manifest = self.manifest.as_ref().unwrap();
        let merge_dir = self.merge_dir.clone().unwrap_or_else(|| ext::sys::parent_dir(manifest));
        let mut config = Config::new(self.threads, merge_dir);
        config.clean = self.clean;
        config
    }
}

pub(super) fn print_help() {
    const KEY: usize = 16;
    const VAL: usize = 4;
    const EMPTY: &'static str = str_repeat!(" ", KEY + VAL + 5);

    let defaults = Args::default();
    println!("{}", "Merge multi-lane FASTQ files and run FastQC on every sample.".yellow());

    println!("\n{} {} -f manifest.tsv [arguments]", "Usage:".bold(), super::PROGRAM);

    println!("\n{}", "Input/output arguments:".bold());
    println!("    {:KEY$} {:VAL$}  Tab-delimited manifest with three columns:\n\
        {EMPTY}  directory, sample name and read mode (1, 2, R1, R2 or Both).\n\
        {EMPTY}  Lines starting with # are ignored.",
        "-f, --file".green(), "FILE".yellow());
    println!("    {:KEY$} {:VAL$}  Write merged FASTQ files to this directory\n\
        {EMPTY}  [default: manifest directory].",
        "-m, --merge".green(), "DIR".yellow());
    println!("    {:KEY$} {:VAL$}  Write FastQC reports to this directory\n\
        {EMPTY}  [default: next to the merged files].",
        "-o, --outdir".green(), "DIR".yellow());
    println!("    {:KEY$} {:VAL$}  Remove merged FASTQ files after QC.",
        "-c, --clean".green(), super::flag());

    println!("\n{}", "Execution parameters:".bold());
    println!("    {:KEY$} {:VAL$}  Number of simultaneous FastQC runs, at most {} [{}].",
        "-t, --threads".green(), "INT".yellow(), MAX_THREADS, super::fmt_def(defaults.threads));
    println!("    {:KEY$} {:VAL$}  FastQC executable [{}].",
        "    --fastqc".green(), "EXE".yellow(), super::fmt_def(defaults.fastqc.display()));
    println!("    {:KEY$} {:VAL$}  Write detailed log to {}.",
        "-v, --verbose".green(), super::flag(), "--log".green());
    println!("    {:KEY$} {:VAL$}  Verbose log file, appended to [{}].",
        "    --log".green(), "FILE".yellow(), super::fmt_def(defaults.log_file.display()));

    println!("\n{}", "Other parameters:".bold());
    println!("    {:KEY$} {:VAL$}  Show this help message.", "-h, --help".green(), "");
    println!("    {:KEY$} {:VAL$}  Show version.", "-V, --version".green(), "");
}

fn parse_args(argv: &[String]) -> Result<Args, lexopt::Error> {
    if argv.is_empty() {
        print_help();
        std::process::exit(1);
    }
    use lexopt::prelude::*;
    let mut args = Args::default();
    let mut parser = lexopt::Parser::from_args(argv);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('f') | Long("file") | Long("manifest") => args.manifest = Some(parser.value()?.parse()?),
            Short('m') | Long("merge") => args.merge_dir = Some(parser.value()?.parse()?),
            Short('o') | Long("outdir") | Long("output") => args.qc_dir = Some(parser.value()?.parse()?),
            Short('c') | Long("clean") => args.clean = true,

            Short('t') | Short('@') | Long("threads") => args.threads = parser.value()?.parse()?,
            Long("fastqc") => args.fastqc = parser.value()?.parse()?,
            Short('v') | Long("verbose") => args.verbose = true,
            Long("log") => args.log_file = parser.value()?.parse()?,

            Short('V') | Long("version") => {
                super::print_version();
                std::process::exit(0);
            }
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            _ => Err(arg.unexpected())?,
        }
    }
    Ok(args)
}

pub(super) fn run(argv: &[String]) -> crate::Result<bool> {
    let args = parse_args(argv)?;
    crate::init_logger(args.verbose, &args.log_file)?;
    let args = args.validate()?;
    log::debug!("Command: {}", std::env::args().collect::<Vec<_>>().join(" "));

    let config = args.config();
    if let Some(qc_dir) = &args.qc_dir {
        ext::sys::mkdir(qc_dir).map_err(add_path!(qc_dir))?;
    }
    let runner = FastqcRunner::new(args.fastqc.clone(), args.qc_dir.clone());
    // unwrap as manifest was previously checked to be Some.
    let report = pipe::run(args.manifest.as_ref().unwrap(), &config, Arc::new(runner))?;
    report.print_summary();
    Ok(report.is_success())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Error;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_all_flags() {
        let args = parse_args(&argv(&["-f", "runs/manifest.tsv", "-t", "20", "-m", "merged", "-v",
            "--clean", "-o", "qc", "--log", "run.log", "--fastqc", "/opt/fastqc"])).unwrap();
        assert_eq!(args.manifest, Some(PathBuf::from("runs/manifest.tsv")));
        assert_eq!(args.threads, 20);
        assert_eq!(args.merge_dir, Some(PathBuf::from("merged")));
        assert_eq!(args.qc_dir, Some(PathBuf::from("qc")));
        assert!(args.verbose && args.clean);
        assert_eq!(args.log_file, PathBuf::from("run.log"));
        assert_eq!(args.fastqc, PathBuf::from("/opt/fastqc"));
        let config = args.config();
        assert_eq!(config.threads, 12);
        assert!(config.clean);
    }

    #[test]
    fn defaults() {
        let args = parse_args(&argv(&["--file", "runs/manifest.tsv"])).unwrap();
        let config = args.config();
        assert_eq!(config.threads, 4);
        assert_eq!(config.merge_dir, PathBuf::from("runs"));
        assert!(!args.verbose);
    }

    #[test]
    fn bad_args() {
        assert!(parse_args(&argv(&["-f", "m.tsv", "--unknown"])).is_err());
        assert!(parse_args(&argv(&["-f", "m.tsv", "-t", "many"])).is_err());
        assert!(parse_args(&argv(&["-f"])).is_err());
    }

    #[test]
    fn missing_manifest_or_exe() {
        let args = parse_args(&argv(&["-t", "2"])).unwrap();
        assert!(matches!(args.validate(), Err(Error::InvalidInput(_))));
        let args = parse_args(&argv(&["-f", "m.tsv", "--fastqc", "/nonexistent/dir/fastqc"])).unwrap();
        assert!(matches!(args.validate(), Err(Error::NoExec(_))));
    }
}
