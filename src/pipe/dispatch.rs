//! Running the QC tool over all jobs in a fixed pool of worker threads.

use std::{
    thread,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::{Duration, Instant},
    sync::{
        Arc, Mutex,
        mpsc::{self, Sender, Receiver},
    },
};
use crate::{
    ext,
    err::{Error, error},
};
use super::{QcJob, clamp_threads};

/// Number of stderr lines, kept in the error message of a failed job.
const STDERR_LINES: usize = 5;

/// Exit code and captured streams of an external tool.
#[derive(Clone, Debug)]
pub struct ToolOutput {
    /// `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// External QC tool, executed once per target file.
pub trait ToolRunner: Send + Sync {
    /// Runs the tool on the file and waits for it to finish.
    /// Returns `Err` only if the tool could not be executed at all.
    fn run(&self, target: &Path) -> crate::Result<ToolOutput>;
}

/// Runs `fastqc [--outdir DIR] --quiet FILE`.
pub struct FastqcRunner {
    exe: PathBuf,
    out_dir: Option<PathBuf>,
}

impl FastqcRunner {
    /// `exe` should be already checked with `ext::sys::find_exe`.
    pub fn new(exe: PathBuf, out_dir: Option<PathBuf>) -> Self {
        Self { exe, out_dir }
    }

    fn command(&self, target: &Path) -> Command {
        let mut command = Command::new(&self.exe);
        if let Some(out_dir) = &self.out_dir {
            command.arg("--outdir").arg(out_dir);
        }
        command.arg("--quiet").arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl ToolRunner for FastqcRunner {
    fn run(&self, target: &Path) -> crate::Result<ToolOutput> {
        let mut command = self.command(target);
        log::debug!("    {}", ext::fmt::command(&command));
        let output = command.output()
            .map_err(|e| error!(Subprocess, "Cannot run {}: {}", ext::fmt::command(&command), e))?;
        Ok(ToolOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Result of a single job.
#[derive(Debug)]
pub struct JobOutcome {
    pub job: QcJob,
    /// `Ok` only if the tool finished successfully.
    pub result: crate::Result<ToolOutput>,
    pub elapsed: Duration,
}

/// Checks that the target exists, runs the tool and converts unsuccessful exit into an error.
fn run_job(job: &QcJob, runner: &dyn ToolRunner) -> crate::Result<ToolOutput> {
    if !job.target.is_file() {
        return Err(Error::MissingTarget(job.target.clone()));
    }
    let output = runner.run(&job.target)?;
    if output.success() {
        Ok(output)
    } else {
        Err(Error::QcJobFailed(job.target.clone(), output.code, ext::fmt::tail(&output.stderr, STDERR_LINES)))
    }
}

/// Task, sent to the workers: job index.
type Task = usize;

struct Worker {
    ix: usize,
    jobs: Arc<Vec<QcJob>>,
    runner: Arc<dyn ToolRunner>,
    receiver: Arc<Mutex<Receiver<Task>>>,
    sender: Sender<(Task, JobOutcome)>,
}

impl Worker {
    fn run(self) {
        loop {
            // Queue lock is released before the job starts.
            let task = match self.receiver.lock() {
                Ok(receiver) => receiver.recv().ok(),
                Err(_) => None,
            };
            let Some(job_ix) = task else { break };
            let job = &self.jobs[job_ix];
            log::debug!("[worker {}] QC of {} {}: {}", self.ix, job.sample, job.read, ext::fmt::path(&job.target));
            let start = Instant::now();
            let result = run_job(job, &*self.runner);
            let elapsed = start.elapsed();
            match &result {
                Ok(_) => log::debug!("[worker {}] {} {} finished in {}",
                    self.ix, job.sample, job.read, ext::fmt::Duration(elapsed)),
                Err(e) => log::error!("{}", e.display()),
            }
            let outcome = JobOutcome { job: job.clone(), result, elapsed };
            if self.sender.send((job_ix, outcome)).is_err() {
                break;
            }
        }
    }
}

/// Runs all jobs, at most `threads` (clamped to `[1, MAX_THREADS]`) at the same time.
/// Failure of one job does not affect other jobs.
/// Output outcomes are in the order of input jobs, regardless of the completion order.
pub fn dispatch(jobs: Vec<QcJob>, threads: u16, runner: Arc<dyn ToolRunner>) -> Vec<JobOutcome> {
    let n_jobs = jobs.len();
    if n_jobs == 0 {
        return Vec::new();
    }
    let n_workers = usize::from(clamp_threads(i64::from(threads))).min(n_jobs);
    let jobs = Arc::new(jobs);

    let (task_sender, task_receiver) = mpsc::channel();
    for job_ix in 0..n_jobs {
        task_sender.send(job_ix).expect("Task queue is closed");
    }
    drop(task_sender);
    let task_receiver = Arc::new(Mutex::new(task_receiver));

    let (outcome_sender, outcome_receiver) = mpsc::channel();
    let mut handles = Vec::with_capacity(n_workers);
    for ix in 0..n_workers {
        let worker = Worker {
            ix,
            jobs: Arc::clone(&jobs),
            runner: Arc::clone(&runner),
            receiver: Arc::clone(&task_receiver),
            sender: outcome_sender.clone(),
        };
        handles.push(thread::spawn(move || worker.run()));
    }
    drop(outcome_sender);

    let mut slots: Vec<Option<JobOutcome>> = (0..n_jobs).map(|_| None).collect();
    for (job_ix, outcome) in outcome_receiver {
        slots[job_ix] = Some(outcome);
    }
    for handle in handles {
        if handle.join().is_err() {
            log::error!("QC worker panicked");
        }
    }

    slots.into_iter().zip(jobs.iter())
        .map(|(slot, job)| slot.unwrap_or_else(|| JobOutcome {
            job: job.clone(),
            result: Err(error!(Subprocess, "QC worker terminated before finishing {}", ext::fmt::path(&job.target))),
            elapsed: Duration::ZERO,
        }))
        .collect()
}
