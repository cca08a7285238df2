//! Batch execution over an index of input files
//!
//! Each file moves `Pending -> Succeeded | Failed` (or is skipped when no
//! pattern claims it). Files are independent: with more than one thread
//! they run on a rayon pool, sharing the [`RunContext`] whose cache and
//! counters are safe to update concurrently.

use crate::core::error::Result;
use crate::core::lift::EndpointLifter;
use crate::core::remap::{RemapCache, RemapSettings};
use crate::core::stats::{RecordKind, RunStatistics};
use crate::core::translate::TranslationService;
use crate::formats::record::{ExcludedRecord, RecordConverter, UNMAPPED_LOG_HEADER};
use crate::formats::{ProbeConverter, SegmentConverter};
use crate::pipeline::classify::FileClassifier;
use crate::pipeline::index::ProgressLog;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// State shared by every conversion in a run
pub struct RunContext {
    engine: Arc<dyn TranslationService>,
    cache: RemapCache,
    stats: RunStatistics,
    settings: RemapSettings,
    fallback: bool,
}

impl RunContext {
    pub fn new(engine: Arc<dyn TranslationService>, settings: RemapSettings, fallback: bool) -> Self {
        Self {
            engine,
            cache: RemapCache::new(),
            stats: RunStatistics::new(),
            settings,
            fallback,
        }
    }

    /// Start from a cache seeded by an earlier run
    pub fn with_cache(mut self, cache: RemapCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &RemapCache {
        &self.cache
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    pub fn lifter(&self) -> EndpointLifter<'_> {
        EndpointLifter::new(self.engine.as_ref(), &self.cache, self.settings, self.fallback)
    }
}

/// Log of records left out of the output tables
///
/// One line per excluded record, tagged with its source file.
#[derive(Debug)]
pub struct ExcludedLog {
    writer: Mutex<BufWriter<File>>,
}

impl ExcludedLog {
    /// Create (truncate) the log and write its header
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "{}", UNMAPPED_LOG_HEADER)?;
        writer.flush()?;
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    pub fn append(&self, source: &Path, records: &[ExcludedRecord]) -> io::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        for record in records {
            writeln!(writer, "{}", record.log_line(source))?;
        }
        writer.flush()
    }
}

/// Final state of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Succeeded(RecordKind),
    Failed(RecordKind),
    /// Matched neither pattern
    Skipped,
}

/// Progress bar in the console style used across the tool
fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    match ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}, ETA: {eta}] [{bar:40.cyan/blue}] {pos:>5.green}/{len:5} {msg}",
    ) {
        Ok(style) => bar.set_style(style.progress_chars("#>-")),
        Err(e) => log::warn!("Progress bar template rejected: {}", e),
    }
    bar.set_message("Lifting");
    bar
}

/// Runs converters over a list of files
pub struct BatchOrchestrator<'a> {
    ctx: &'a RunContext,
    classifier: &'a FileClassifier,
    input_dir: PathBuf,
    output_dir: PathBuf,
    segments: SegmentConverter,
    probes: ProbeConverter,
    progress: Option<ProgressLog>,
    excluded: Option<ExcludedLog>,
    threads: usize,
    show_progress: bool,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        ctx: &'a RunContext,
        classifier: &'a FileClassifier,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ctx,
            classifier,
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            segments: SegmentConverter::default(),
            probes: ProbeConverter::default(),
            progress: None,
            excluded: None,
            threads: 1,
            show_progress: false,
        }
    }

    /// Rename the leading output columns
    pub fn with_headers(
        mut self,
        segment: Option<[String; 4]>,
        probe: Option<[String; 3]>,
    ) -> Self {
        self.segments = SegmentConverter::new(segment);
        self.probes = ProbeConverter::new(probe);
        self
    }

    pub fn with_progress_log(mut self, log: ProgressLog) -> Self {
        self.progress = Some(log);
        self
    }

    pub fn with_excluded_log(mut self, log: ExcludedLog) -> Self {
        self.excluded = Some(log);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn converter(&self, kind: RecordKind) -> &dyn RecordConverter {
        match kind {
            RecordKind::Segment => &self.segments,
            RecordKind::Probe => &self.probes,
        }
    }

    /// Convert one file and record its outcome
    ///
    /// Never fails: file errors are logged and counted.
    pub fn process_file(&self, path: &Path) -> FileStatus {
        let Some((kind, output)) =
            self.classifier
                .output_path(path, &self.input_dir, &self.output_dir)
        else {
            log::error!("Unknown file type: {}", path.display());
            self.ctx.stats().file_skipped();
            return FileStatus::Skipped;
        };

        log::info!("Processing {}:\t{}", kind, path.display());
        let lifter = self.ctx.lifter();

        match self.converter(kind).convert_file(path, &output, &lifter) {
            Ok(conversion) => {
                if let Some(excluded) = &self.excluded {
                    if let Err(e) = excluded.append(path, &conversion.excluded) {
                        log::warn!("Failed to log excluded records of {}: {}", path.display(), e);
                    }
                }
                self.ctx.stats().file_succeeded(kind, &conversion.counts);
                if let Some(progress) = &self.progress {
                    if let Err(e) = progress.record(path) {
                        log::warn!("Failed to record progress for {}: {}", path.display(), e);
                    }
                }
                log::info!("Finished {}", path.display());
                FileStatus::Succeeded(kind)
            }
            Err(e) => {
                log::error!("Failure in {}: {}: {}", kind, path.display(), e);
                self.ctx.stats().file_failed(kind);
                FileStatus::Failed(kind)
            }
        }
    }

    /// Process `files` in order (or on a pool when threads > 1)
    ///
    /// Statuses are returned in input order.
    pub fn run(&self, files: &[PathBuf]) -> Result<Vec<FileStatus>> {
        let bar = if self.show_progress {
            progress_bar(files.len())
        } else {
            ProgressBar::hidden()
        };

        let step = |path: &PathBuf| {
            let status = self.process_file(path);
            bar.inc(1);
            status
        };

        let statuses = if self.threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .build()
                .map_err(|e| {
                    io::Error::new(
                        io::ErrorKind::Other,
                        format!("Failed to create thread pool: {}", e),
                    )
                })?;
            pool.install(|| files.par_iter().map(step).collect())
        } else {
            files.iter().map(step).collect()
        };

        bar.finish_with_message("Done");
        Ok(statuses)
    }
}
