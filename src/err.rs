use std::{
    io,
    fmt::Write,
    path::PathBuf,
};
use colored::Colorize;
use crate::{
    ext,
    pipe::ReadMode,
};

/// General enum, representing possible errors.
#[derive(Debug)]
pub enum Error {
    Io(io::Error, Vec<PathBuf>),
    /// Error, produced by an argument parser.
    Lexopt(lexopt::Error),
    /// Manifest line could not be parsed: `(1-based line number, reason)`.
    ManifestParse(usize, String),
    /// Source directory of a sample does not exist: `(sample name, directory)`.
    SampleDirMissing(String, PathBuf),
    /// No lane files were found for a sample and the requested read direction(s).
    LaneFilesNotFound(String, ReadMode),
    /// Target file of a QC job is absent at dispatch time.
    MissingTarget(PathBuf),
    /// QC tool finished unsuccessfully: `(target file, exit code or None if killed by a signal,
    /// last lines of stderr)`.
    QcJobFailed(PathBuf, Option<i32>, String),
    /// Executable not found.
    NoExec(PathBuf),
    /// Subcommand could not be started or collected.
    Subprocess(String),
    InvalidInput(String),
    InvalidData(String),
    RuntimeError(String),
}

impl From<lexopt::Error> for Error {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e, Vec::new())
    }
}

impl Error {
    /// Format error message.
    pub fn display(&self) -> String {
        let mut s = String::new();
        match self {
            Self::Io(e, files) => {
                write!(s, "{} in relation to ", "Input/Output error".red()).unwrap();
                if files.is_empty() {
                    write!(s, "unnamed streams").unwrap();
                } else {
                    write!(s, "{}", files.iter().map(|f| ext::fmt::path(f).cyan().to_string())
                        .collect::<Vec<_>>().join(", ")).unwrap();
                }
                write!(s, ": {}", e.kind()).unwrap();
                if let Some(e2) = e.get_ref() {
                    write!(s, ", {}", e2).unwrap();
                }
            }
            Self::Lexopt(e) => write!(s, "{} to parse command-line arguments: {}", "Failed".red(), e).unwrap(),
            Self::ManifestParse(line, e) => write!(s, "{} at manifest line {}: {}",
                "Parsing error".red(), line, e).unwrap(),
            Self::SampleDirMissing(sample, dir) => write!(s, "{} for sample {}: {}",
                "Missing directory".red(), sample.bold(), ext::fmt::path(dir).cyan()).unwrap(),
            Self::LaneFilesNotFound(sample, mode) => write!(s, "{} ({}) for sample {}",
                "No lane files".red(), mode, sample.bold()).unwrap(),
            Self::MissingTarget(path) => write!(s, "{}: {}",
                "QC target does not exist".red(), ext::fmt::path(path).cyan()).unwrap(),
            Self::QcJobFailed(path, code, stderr) => {
                write!(s, "{} on {} ", "QC tool failed".red(), ext::fmt::path(path).cyan()).unwrap();
                match code {
                    Some(code) => write!(s, "(exit code {})", code).unwrap(),
                    None => write!(s, "(terminated by a signal)").unwrap(),
                }
                if !stderr.is_empty() {
                    write!(s, ":\n{}", stderr).unwrap();
                }
            }
            Self::NoExec(path) => write!(s, "{} at {}", "Could not find executable".red(),
                ext::fmt::path(path).cyan()).unwrap(),
            Self::Subprocess(e) => write!(s, "{}: {}", "Subprocess error".red(), e).unwrap(),
            Self::InvalidInput(e) => write!(s, "{}: {}", "Invalid input".red(), e).unwrap(),
            Self::InvalidData(e) => write!(s, "{}: {}", "Invalid data".red(), e).unwrap(),
            Self::RuntimeError(e) => write!(s, "{}: {}", "Runtime error".red(), e).unwrap(),
        };
        s
    }
}

macro_rules! validate_param {
    ($cond:expr, $($arg:expr),+) => {{
        if !($cond) {
            (
                Err($crate::Error::InvalidInput(format!($($arg),+)))
            ?)
        }
    }};
}
pub(crate) use validate_param;

macro_rules! add_path {
    (!) => {
        |e| $crate::Error::Io(e, Vec::new())
    };
    ($path:expr) => {
        |e| $crate::Error::Io(e, vec![std::convert::AsRef::<std::path::Path>::as_ref(&$path).to_owned()])
    };
    ($($path:expr),+) => {
        |e| {
            let mut v = Vec::new();
            $(
                v.push(std::convert::AsRef::<std::path::Path>::as_ref(&$path).to_owned());
            )*
            $crate::Error::Io(e, v)
        }
    };
}
pub(crate) use add_path;

macro_rules! error {
    ($var:ident, $($arg:expr),+ $(,)?) => {
        $crate::Error::$var(format!($($arg),+))
    }
}
pub(crate) use error;

/// Wrapper around the standard result.
pub type Result<T> = std::result::Result<T, Error>;
