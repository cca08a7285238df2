//! Coordinate translation engine boundary
//!
//! The conversion pipeline never computes coordinates itself. It hands
//! batches of points to a [`TranslationService`] and gets back whatever the
//! engine managed to translate. Results are matched to queries by id only:
//! engines are free to reorder output, and an id that is missing from the
//! output is unmapped.
//!
//! [`LiftOverCommand`] drives the UCSC `liftOver` executable. Each call gets
//! its own scratch directory, so concurrent callers never share file names.

use crate::core::error::{TranslationError, TranslationResult};
use crate::core::io::DEFAULT_BUFFER_SIZE;
use crate::core::Chrom;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Poll interval while waiting on an engine with a timeout
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A single position to translate, tagged with a caller-chosen id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointQuery {
    pub id: u64,
    pub chrom: Chrom,
    pub position: u64,
}

impl PointQuery {
    pub fn new(id: u64, chrom: Chrom, position: u64) -> Self {
        Self { id, chrom, position }
    }
}

/// A translated position as reported by the engine
///
/// The chromosome is kept as the engine spelled it; target assemblies
/// may contain contigs outside the valid chromosome set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedPoint {
    pub id: u64,
    pub chrom: String,
    pub position: u64,
}

impl TranslatedPoint {
    pub fn new(id: u64, chrom: impl Into<String>, position: u64) -> Self {
        Self {
            id,
            chrom: chrom.into(),
            position,
        }
    }

    /// The translated chromosome, if it is in the valid set
    pub fn valid_chrom(&self) -> Option<Chrom> {
        Chrom::parse(&self.chrom)
    }
}

/// A batch interval-mapping service
pub trait TranslationService: Send + Sync {
    /// Translate every query as the 1-base interval `[position, position + 1)`
    ///
    /// Returns one entry per translated query, in any order. Queries that
    /// could not be translated are simply absent. An `Err` means the engine
    /// itself failed and nothing from this batch can be trusted.
    fn translate(&self, queries: &[PointQuery]) -> TranslationResult<Vec<TranslatedPoint>>;
}

impl<T: TranslationService + ?Sized> TranslationService for Box<T> {
    fn translate(&self, queries: &[PointQuery]) -> TranslationResult<Vec<TranslatedPoint>> {
        (**self).translate(queries)
    }
}

impl<T: TranslationService + ?Sized> TranslationService for std::sync::Arc<T> {
    fn translate(&self, queries: &[PointQuery]) -> TranslationResult<Vec<TranslatedPoint>> {
        (**self).translate(queries)
    }
}

/// Driver for the UCSC `liftOver` executable
///
/// Runs `liftOver <input.bed> <chain> <mapped.bed> <unmapped.bed>` with
/// stdout/stderr discarded.
#[derive(Debug, Clone)]
pub struct LiftOverCommand {
    program: PathBuf,
    chain: PathBuf,
    timeout: Option<Duration>,
    scratch_root: Option<PathBuf>,
}

impl LiftOverCommand {
    pub fn new(program: impl Into<PathBuf>, chain: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            chain: chain.into(),
            timeout: None,
            scratch_root: None,
        }
    }

    /// Kill the engine and fail the batch after `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create per-call scratch directories under `root` instead of the system temp dir
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn chain(&self) -> &Path {
        &self.chain
    }

    fn scratch_dir(&self) -> io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("liftover-");
        match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }

    fn wait(&self, child: &mut Child) -> TranslationResult<ExitStatus> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= timeout {
                // Best effort: the batch has already failed
                let _ = child.kill();
                let _ = child.wait();
                return Err(TranslationError::Timeout {
                    program: self.program.clone(),
                    timeout,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl TranslationService for LiftOverCommand {
    fn translate(&self, queries: &[PointQuery]) -> TranslationResult<Vec<TranslatedPoint>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let scratch = self.scratch_dir()?;
        let input = scratch.path().join("query.bed");
        let mapped = scratch.path().join("mapped.bed");
        let unmapped = scratch.path().join("query.unmapped");

        {
            let mut writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, File::create(&input)?);
            write_query_bed(&mut writer, queries)?;
            writer.flush()?;
        }

        let mut child = Command::new(&self.program)
            .arg(&input)
            .arg(&self.chain)
            .arg(&mapped)
            .arg(&unmapped)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| TranslationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let status = self.wait(&mut child)?;
        if !status.success() {
            return Err(TranslationError::Failed {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }

        let file = File::open(&mapped).map_err(|_| TranslationError::MissingOutput(mapped.clone()))?;
        let results = parse_mapped_bed(BufReader::new(file))?;
        log::debug!(
            "liftOver translated {}/{} positions",
            results.len(),
            queries.len()
        );
        Ok(results)
    }
}

/// Write queries as BED lines: `chrom  start  start+1  id`
///
/// A position whose interval end does not fit in `u64` is left out, so the
/// engine reports it as unmapped.
pub fn write_query_bed<W: Write>(writer: &mut W, queries: &[PointQuery]) -> io::Result<()> {
    for q in queries {
        let Some(end) = q.position.checked_add(1) else {
            log::debug!("Skipping out of range position {}:{}", q.chrom, q.position);
            continue;
        };
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            q.chrom.ucsc_name(),
            q.position,
            end,
            q.id
        )?;
    }
    Ok(())
}

/// Parse a mapped-results BED file produced by the engine
///
/// Lines without a numeric start and id are skipped.
pub fn parse_mapped_bed<R: BufRead>(reader: R) -> io::Result<Vec<TranslatedPoint>> {
    let mut results = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() < 4 {
            log::debug!("Skipping short engine output line {}: {}", line_no + 1, trimmed);
            continue;
        }
        match (fields[1].parse::<u64>(), fields[3].parse::<u64>()) {
            (Ok(position), Ok(id)) => results.push(TranslatedPoint::new(id, fields[0], position)),
            _ => log::debug!("Skipping malformed engine output line {}: {}", line_no + 1, trimmed),
        }
    }
    Ok(results)
}
