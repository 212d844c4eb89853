//! Finding per-lane FASTQ files of a sample and concatenating them into one file per read direction.

use std::{
    collections::{HashMap, HashSet},
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use lazy_static::lazy_static;
use regex::Regex;
use crate::{
    ext,
    err::{Error, add_path, error},
};
use super::{ReadDirection, ReadMode, SampleDescriptor};

lazy_static! {
    /// `<sample>_L<lane>_R<1|2>[_<chunk>].fastq[.gz]`, `.fq` extension is allowed as well.
    static ref LANE_FILE_REGEX: Regex =
        Regex::new(r"^(.+)_L([0-9]+)_R([12])(?:_([0-9]+))?\.f(?:ast)?q(\.gz)?$").unwrap();
}

/// A parsed name of a single-lane FASTQ file, such as `Exp001_S1_L002_R1_001.fastq.gz`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaneFile {
    pub sample: String,
    pub lane: u32,
    pub read: ReadDirection,
    /// Files without chunk suffix have chunk 0.
    pub chunk: u32,
    pub compressed: bool,
    pub path: PathBuf,
}

impl LaneFile {
    /// Attempt to parse filename of `path` as a lane file.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let filename = path.as_ref().file_name()?.to_str()?;
        let cap = LANE_FILE_REGEX.captures(filename)?;
        Some(Self {
            sample: cap[1].to_owned(),
            lane: cap[2].parse().ok()?,
            read: ReadDirection::from_number(cap[3].parse().ok()?)?,
            chunk: match cap.get(4) {
                Some(m) => m.as_str().parse().ok()?,
                None => 0,
            },
            compressed: cap.get(5).is_some(),
            path: path.as_ref().to_owned(),
        })
    }

    /// Key, by which files are concatenated.
    fn order_key(&self) -> (ReadDirection, u32, u32, &Path) {
        (self.read, self.lane, self.chunk, &self.path)
    }
}

/// Finds all lane files of the sample in `dir` and its subdirectories, except for paths rejected by `skip`.
/// Output is sorted by read direction, then by lane and chunk numbers.
pub fn find_lane_files(dir: &Path, sample: &str, skip: impl Fn(&Path) -> bool) -> crate::Result<Vec<LaneFile>> {
    let pattern = format!("{}/**/{}_L*",
        glob::Pattern::escape(&dir.to_string_lossy()), glob::Pattern::escape(sample));
    let paths = glob::glob(&pattern).map_err(|e| error!(InvalidInput, "Cannot search for {}: {}", pattern, e))?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            let path = e.path().to_owned();
            Error::Io(io::Error::from(e), vec![path])
        })?;
        if !path.is_file() {
            continue;
        }
        if skip(&path) {
            log::debug!("    Skipping merged file {}", ext::fmt::path(&path));
            continue;
        }
        match LaneFile::new(&path) {
            Some(file) if file.sample == sample => files.push(file),
            _ => log::debug!("    Skipping {}", ext::fmt::path(&path)),
        }
    }
    files.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
    Ok(files)
}

/// Lane files of a single sample and direction, which can be safely concatenated.
fn check_group(sample: &str, group: &[&LaneFile]) -> crate::Result<()> {
    if group.iter().any(|file| file.compressed != group[0].compressed) {
        return Err(error!(InvalidData, "Sample {} {} has both compressed and uncompressed lane files",
            sample, group[0].read));
    }
    for pair in group.windows(2) {
        if pair[0].lane == pair[1].lane && pair[0].chunk == pair[1].chunk {
            return Err(error!(InvalidData, "Sample {} has several {} files for lane {}: {} and {}",
                sample, pair[0].read, pair[0].lane, ext::fmt::path(&pair[0].path), ext::fmt::path(&pair[1].path)));
        }
    }
    Ok(())
}

/// Merged file, for example `merge_dir/Exp001_S1_R2.fastq.gz`.
pub fn merged_filename(merge_dir: &Path, prefix: &str, read: ReadDirection, compressed: bool) -> PathBuf {
    merge_dir.join(format!("{}_{}.fastq{}", prefix, read, if compressed { ".gz" } else { "" }))
}

/// Prefixes of merged files, one for each manifest row.
/// Sample name is used as is, unless it appears in several rows. Then, `_line<N>` is appended to it.
pub fn output_prefixes(samples: &[SampleDescriptor]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for sample in samples.iter() {
        *counts.entry(&sample.name).or_default() += 1;
    }
    samples.iter()
        .map(|sample| if counts[sample.name.as_str()] > 1 {
            format!("{}_line{}", sample.name, sample.line)
        } else {
            sample.name.clone()
        })
        .collect()
}

/// Concatenates files byte-by-byte in the given order.
/// Output is first written to a temporary file, which replaces `out_filename` at the end.
fn concatenate(group: &[&LaneFile], out_filename: &Path) -> crate::Result<()> {
    let tmp_filename = ext::sys::append_path(out_filename, ".tmp");
    let mut writer = BufWriter::new(File::create(&tmp_filename).map_err(add_path!(tmp_filename))?);
    let mut total = 0;
    for file in group.iter() {
        let mut reader = File::open(&file.path).map_err(add_path!(file.path))?;
        total += io::copy(&mut reader, &mut writer).map_err(add_path!(file.path, tmp_filename))?;
    }
    writer.flush().map_err(add_path!(tmp_filename))?;
    fs::rename(&tmp_filename, out_filename).map_err(add_path!(tmp_filename, out_filename))?;
    log::debug!("    Wrote {} bytes from {} to {}", total, ext::fmt::count(group.len(), "file"),
        ext::fmt::path(out_filename));
    Ok(())
}

/// Merged FASTQ files of one sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedFileSet {
    pub sample: String,
    pub r1: Option<PathBuf>,
    pub r2: Option<PathBuf>,
}

impl MergedFileSet {
    pub fn new(sample: String) -> Self {
        Self {
            sample,
            r1: None,
            r2: None,
        }
    }

    pub fn get(&self, read: ReadDirection) -> Option<&Path> {
        match read {
            ReadDirection::R1 => self.r1.as_deref(),
            ReadDirection::R2 => self.r2.as_deref(),
        }
    }

    pub fn set(&mut self, read: ReadDirection, path: PathBuf) {
        match read {
            ReadDirection::R1 => self.r1 = Some(path),
            ReadDirection::R2 => self.r2 = Some(path),
        }
    }

    /// Iterates over existing merged files in the R1, R2 order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.r1.as_deref().into_iter().chain(self.r2.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.r1.is_none() && self.r2.is_none()
    }
}

/// Writes merged files of all samples into one directory.
pub struct Merger {
    merge_dir: PathBuf,
    /// Canonical paths of all files that this run may write.
    /// They are never used as lane files, even when the merge directory is searched for lanes.
    outputs: HashSet<PathBuf>,
}

impl Merger {
    /// Merge directory must already exist.
    pub fn new(merge_dir: &Path, prefixes: &[String]) -> crate::Result<Self> {
        let canon_dir = merge_dir.canonicalize().map_err(add_path!(merge_dir))?;
        let mut outputs = HashSet::new();
        for prefix in prefixes.iter() {
            for read in [ReadDirection::R1, ReadDirection::R2] {
                for compressed in [false, true] {
                    outputs.insert(merged_filename(&canon_dir, prefix, read, compressed));
                }
            }
        }
        Ok(Self {
            merge_dir: merge_dir.to_owned(),
            outputs,
        })
    }

    fn is_output(&self, path: &Path) -> bool {
        path.canonicalize().map_or(false, |path| self.outputs.contains(&path))
    }

    /// Merges lane files of the sample for all requested read directions into `<prefix>_R<n>.fastq[.gz]`.
    ///
    /// Explicitly requested single direction must have at least one lane file.
    /// In the `Both` mode, one of the directions may be absent.
    pub fn merge_sample(&self, sample: &SampleDescriptor, prefix: &str) -> crate::Result<MergedFileSet> {
        if !sample.source_dir.is_dir() {
            return Err(Error::SampleDirMissing(sample.name.clone(), sample.source_dir.clone()));
        }
        let lane_files = find_lane_files(&sample.source_dir, &sample.name, |path| self.is_output(path))?;
        let mut merged = MergedFileSet::new(sample.name.clone());
        for &read in sample.read_mode.directions() {
            let group: Vec<&LaneFile> = lane_files.iter().filter(|file| file.read == read).collect();
            if group.is_empty() {
                if sample.read_mode != ReadMode::Both {
                    return Err(Error::LaneFilesNotFound(sample.name.clone(), sample.read_mode));
                }
                log::debug!("    No {} lane files for {}", read, sample.name);
                continue;
            }
            check_group(&sample.name, &group)?;
            let out_filename = merged_filename(&self.merge_dir, prefix, read, group[0].compressed);
            concatenate(&group, &out_filename)?;
            merged.set(read, out_filename);
        }

        if merged.is_empty() {
            Err(Error::LaneFilesNotFound(sample.name.clone(), sample.read_mode))
        } else {
            Ok(merged)
        }
    }
}
