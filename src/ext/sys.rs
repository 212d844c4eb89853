use std::{
    io::{self, Read, BufRead, BufReader},
    fs::{self, File},
    path::{Path, PathBuf},
    ffi::OsStr,
};
use flate2::bufread::MultiGzDecoder;
use crate::Error;

/// Finds an executable, and returns Error, if executable is not available.
pub fn find_exe(p: impl AsRef<Path>) -> crate::Result<PathBuf> {
    which::which(p.as_ref()).map_err(|_| Error::NoExec(p.as_ref().to_owned()))
}

/// Returns
/// - gzip reader if the file starts with the gzip magic number,
/// - regular text file otherwise.
pub fn open(filename: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let mut stream = BufReader::new(File::open(filename)?);
    let mut two_bytes = [0_u8; 2];
    let bytes_read = stream.read(&mut two_bytes)?;
    stream.seek_relative(-(bytes_read as i64))?;
    // Check gzip magic number.
    if bytes_read == 2 && two_bytes[0] == 0x1f && two_bytes[1] == 0x8b {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(stream))))
    } else {
        Ok(Box::new(stream))
    }
}

/// Returns a path with a new suffix appended to the end.
pub fn append_path(path: &Path, suffix: impl AsRef<OsStr>) -> PathBuf {
    let mut os_string = path.as_os_str().to_owned();
    os_string.push(suffix.as_ref());
    os_string.into()
}

/// Create directory together with all its parents, if it does not exist yet.
pub fn mkdir(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path)
    } else if path.is_dir() {
        Ok(())
    } else {
        Err(io::Error::new(io::ErrorKind::AlreadyExists, "path exists and is not a directory"))
    }
}

/// Directory, containing the file. Returns `.` for bare filenames.
pub fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_owned(),
        _ => PathBuf::from("."),
    }
}
