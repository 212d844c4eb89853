//! Tab-delimited manifest: one sample per line, `directory  sample  read-mode`.

use std::{
    io::BufRead,
    path::{Path, PathBuf},
};
use crate::{
    ext,
    err::{Error, add_path},
};
use super::ReadMode;

/// Sample, described by one manifest line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleDescriptor {
    /// Directory with lane FASTQ files (searched recursively).
    pub source_dir: PathBuf,
    pub name: String,
    pub read_mode: ReadMode,
    /// 1-based line in the manifest.
    pub line: usize,
}

/// Splits line into fields. Tab-delimited lines may contain spaces within fields.
fn split_fields(line: &str) -> Vec<&str> {
    if line.contains('\t') {
        line.split('\t').map(str::trim).filter(|s| !s.is_empty()).collect()
    } else {
        line.split_whitespace().collect()
    }
}

/// Parses a single manifest line. Returns `None` for comments and empty lines.
/// Relative directories are resolved against `base_dir`.
pub fn parse_line(line: &str, line_num: usize, base_dir: &Path) -> crate::Result<Option<SampleDescriptor>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let fields = split_fields(trimmed);
    if fields.len() != 3 {
        return Err(Error::ManifestParse(line_num,
            format!("expected 3 fields (directory, sample, read mode), found {}", fields.len())));
    }
    let read_mode: ReadMode = fields[2].parse().map_err(|e| Error::ManifestParse(line_num, e))?;
    let dir = Path::new(fields[0]);
    Ok(Some(SampleDescriptor {
        source_dir: if dir.is_relative() { base_dir.join(dir) } else { dir.to_owned() },
        name: fields[1].to_owned(),
        read_mode,
        line: line_num,
    }))
}

/// Reads all samples from the stream, preserving their order.
/// Stops at the first malformed line.
pub fn read(stream: impl BufRead, base_dir: &Path) -> crate::Result<Vec<SampleDescriptor>> {
    let mut samples = Vec::new();
    for (i, line) in stream.lines().enumerate() {
        let line = line?;
        if let Some(sample) = parse_line(&line, i + 1, base_dir)? {
            log::debug!("    Line {}: {} in {} ({})", sample.line, sample.name,
                ext::fmt::path(&sample.source_dir), sample.read_mode);
            samples.push(sample);
        }
    }
    Ok(samples)
}

/// Loads manifest from a (possibly gzipped) file.
pub fn load(filename: &Path) -> crate::Result<Vec<SampleDescriptor>> {
    let stream = ext::sys::open(filename).map_err(add_path!(filename))?;
    let base_dir = ext::sys::parent_dir(filename);
    read(stream, &base_dir).map_err(|e| match e {
        Error::Io(e, _) => Error::Io(e, vec![filename.to_owned()]),
        e => e,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use pretty_assertions::assert_eq;

    fn sample(dir: &str, name: &str, read_mode: ReadMode, line: usize) -> SampleDescriptor {
        SampleDescriptor {
            source_dir: PathBuf::from(dir),
            name: name.to_owned(),
            read_mode,
            line,
        }
    }

    #[test]
    fn order_and_comments() -> Result<(), Error> {
        let text = "# directory\tsample\treads\n\
            /data/run1\tExp001_S1\t1\n\
            \n\
            /data/run1\tExp001_S2\tR2\n\
            \t\n\
            # another comment\n\
            /data/run2\tExp001_S1\tboth\n\
            /data/run2 Exp002_S7 B\n";
        let samples = read(text.as_bytes(), Path::new("/base"))?;
        let expected = vec![
            sample("/data/run1", "Exp001_S1", ReadMode::R1, 2),
            sample("/data/run1", "Exp001_S2", ReadMode::R2, 4),
            sample("/data/run2", "Exp001_S1", ReadMode::Both, 7),
            sample("/data/run2", "Exp002_S7", ReadMode::Both, 8),
        ];
        assert_eq!(samples, expected);
        Ok(())
    }

    #[test]
    fn relative_dirs_and_spaces() -> Result<(), Error> {
        let samples = read("my runs/run 1\tS1\tR1\n".as_bytes(), Path::new("/base"))?;
        assert_eq!(samples, vec![sample("/base/my runs/run 1", "S1", ReadMode::R1, 1)]);
        Ok(())
    }

    #[test]
    fn bad_read_mode() {
        let text = "/data\tS1\t1\n/data\tS2\tR3\n";
        match read(text.as_bytes(), Path::new(".")) {
            Err(Error::ManifestParse(line, msg)) => {
                assert_eq!(line, 2);
                assert!(msg.contains("R3"));
            }
            res => panic!("Unexpected result {:?}", res),
        }
    }

    #[test]
    fn wrong_number_of_fields() {
        assert!(matches!(parse_line("/data\tS1", 5, Path::new(".")), Err(Error::ManifestParse(5, _))));
        assert!(matches!(parse_line("/data\tS1\t1\textra", 1, Path::new(".")), Err(Error::ManifestParse(1, _))));
        assert!(matches!(parse_line("   # /data\tS1", 1, Path::new(".")), Ok(None)));
    }

    #[test]
    fn missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.tsv");
        match load(&path) {
            Err(Error::Io(_, paths)) => assert_eq!(paths, vec![path]),
            res => panic!("Unexpected result {:?}", res),
        }
    }

    #[test]
    fn load_relative_to_manifest() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("manifest.tsv");
        fs::write(&path, "reads\tS1\t2\n")?;
        let samples = load(&path)?;
        assert_eq!(samples, vec![sample(&dir.path().join("reads").to_string_lossy(), "S1", ReadMode::Both, 1)]);
        Ok(())
    }
}
