//! File index, progress files and the log directory
//!
//! A run works from an index (one input path per line). Every finished file
//! is appended to a progress file, so an interrupted run resumes with
//! `index - progress`.

use crate::core::io::write_atomic;
use crate::core::stats::RecordKind;
use crate::pipeline::classify::FileClassifier;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

/// Log file names of one run
///
/// The first run in a directory writes `liftover.log`, `progress.log`, ...;
/// later runs take the first suffix under which none of these exist:
/// `liftover_2.log`, `liftover_3.log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    dir: PathBuf,
    suffix: String,
}

/// Stems of every log a run writes
const LOG_STEMS: [&str; 5] = ["liftover", "progress", "unmapped", "remapped", "fileList"];

impl LogPaths {
    /// Create the log directory if needed and reserve the run's suffix
    ///
    /// The run log is created empty right away, so the suffix stays taken
    /// even when logging goes to stderr.
    pub fn allocate<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let taken = |suffix: &str| {
            LOG_STEMS
                .iter()
                .any(|stem| dir.join(format!("{}{}.log", stem, suffix)).exists())
        };
        let suffix = if !taken("") {
            String::new()
        } else {
            let mut n = 2;
            while taken(&format!("_{}", n)) {
                n += 1;
            }
            format!("_{}", n)
        };

        let paths = Self { dir, suffix };
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(paths.liftover_log())?;
        Ok(paths)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    fn path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}{}.log", stem, self.suffix))
    }

    pub fn liftover_log(&self) -> PathBuf {
        self.path("liftover")
    }

    pub fn progress_log(&self) -> PathBuf {
        self.path("progress")
    }

    pub fn unmapped_log(&self) -> PathBuf {
        self.path("unmapped")
    }

    pub fn remapped_log(&self) -> PathBuf {
        self.path("remapped")
    }

    pub fn file_list(&self) -> PathBuf {
        self.path("fileList")
    }
}

/// Files found per kind while indexing
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexCounts {
    pub segments: usize,
    pub probes: usize,
}

/// Walk `input_dir` and collect every file the classifier recognizes
///
/// Entries are visited in file-name order so the index is reproducible.
/// Unreadable entries are logged and skipped.
pub fn index_files(
    input_dir: &Path,
    classifier: &FileClassifier,
    limit: Option<usize>,
) -> (Vec<PathBuf>, IndexCounts) {
    let mut files = Vec::new();
    let mut counts = IndexCounts::default();

    for entry in WalkDir::new(input_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if limit.is_some_and(|n| files.len() >= n) {
            break;
        }
        let Some(found) = classifier.classify(entry.path()) else {
            continue;
        };
        match found.kind {
            RecordKind::Segment => counts.segments += 1,
            RecordKind::Probe => counts.probes += 1,
        }
        files.push(entry.into_path());
    }

    log::info!(
        "Indexed {} segment files and {} probe files under {}",
        counts.segments,
        counts.probes,
        input_dir.display()
    );
    (files, counts)
}

/// Read a file list: one path per line, blank lines ignored
pub fn read_file_list<P: AsRef<Path>>(path: P) -> io::Result<Vec<PathBuf>> {
    let reader = BufReader::new(File::open(path)?);
    let mut files = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            files.push(PathBuf::from(line));
        }
    }
    Ok(files)
}

pub fn write_file_list<P: AsRef<Path>>(path: P, files: &[PathBuf]) -> io::Result<()> {
    write_atomic(path, |w| {
        for file in files {
            writeln!(w, "{}", file.display())?;
        }
        Ok(())
    })
}

/// Files still to process: `index - progress`, in index order
///
/// # Examples
/// ```
/// use segment_liftover::pipeline::resume_set;
/// use std::path::PathBuf;
///
/// let index: Vec<PathBuf> = ["a", "b", "c"].iter().map(PathBuf::from).collect();
/// let progress = vec![PathBuf::from("b")];
/// assert_eq!(resume_set(&index, &progress), vec![PathBuf::from("a"), PathBuf::from("c")]);
/// ```
pub fn resume_set(index: &[PathBuf], progress: &[PathBuf]) -> Vec<PathBuf> {
    let done: HashSet<&PathBuf> = progress.iter().collect();
    let mut seen = HashSet::new();
    index
        .iter()
        .filter(|p| !done.contains(p) && seen.insert(*p))
        .cloned()
        .collect()
}

/// Append-only record of finished files
///
/// Each line is flushed as soon as it is written, so a crash loses at most
/// the file being processed.
#[derive(Debug)]
pub struct ProgressLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ProgressLog {
    /// Open `path` for appending, creating it if needed
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, finished: &Path) -> io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(file, "{}", finished.display())?;
        file.flush()
    }
}

/// Delete the regular files in `dir`; returns how many were removed
pub fn clean_log_dir<P: AsRef<Path>>(dir: P) -> io::Result<usize> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}
