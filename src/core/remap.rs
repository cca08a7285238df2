//! Fallback remapping of unmappable positions
//!
//! Translation engines report many legitimate positions as unmapped when
//! they sit next to an alignment gap. The [`UnmappableResolver`] probes
//! neighbours at fixed offsets (`+step, -step, +2·step, -2·step, ...`) and
//! takes the first one that translates back onto the same chromosome.
//!
//! Every resolution is memoized in a [`RemapCache`] shared by the whole run,
//! so a position costs at most one search per run, or none when the cache
//! was seeded from a previous run's remap log.

use crate::core::error::{ConfigError, ConfigResult, RemapLogError, TranslationResult};
use crate::core::translate::{PointQuery, TranslationService};
use crate::core::Chrom;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Default distance between probed neighbours (bases)
pub const DEFAULT_STEP_SIZE: i64 = 400;

/// Default search range in each direction (kilobases)
pub const DEFAULT_RANGE_KB: i64 = 10;

/// Upper bound on `steps`; each step costs two engine queries per position
pub const MAX_STEPS: u64 = 10_000;

/// Header line of the remap log
pub const REMAP_LOG_HEADER: &str = "name\tnew_chr\tnew_pos\tresult";

/// Cache key: original chromosome and position, written as `chr1_1000`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemapKey {
    pub chrom: Chrom,
    pub position: u64,
}

impl RemapKey {
    pub fn new(chrom: Chrom, position: u64) -> Self {
        Self { chrom, position }
    }
}

impl From<&PointQuery> for RemapKey {
    fn from(q: &PointQuery) -> Self {
        Self::new(q.chrom, q.position)
    }
}

impl fmt::Display for RemapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.chrom, self.position)
    }
}

impl FromStr for RemapKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chrom, pos) = s
            .rsplit_once('_')
            .ok_or_else(|| format!("remap key without '_': {}", s))?;
        let chrom = Chrom::parse(chrom).ok_or_else(|| format!("invalid chromosome in key: {}", s))?;
        let position = pos
            .parse()
            .map_err(|_| format!("invalid position in key: {}", s))?;
        Ok(Self::new(chrom, position))
    }
}

/// Outcome of a stepwise search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapEntry {
    /// A neighbour translated onto the same chromosome
    Mapped { chrom: Chrom, position: u64 },
    /// Nothing in the search radius translated onto the same chromosome
    Unmapped,
}

impl RemapEntry {
    pub fn is_mapped(&self) -> bool {
        matches!(self, RemapEntry::Mapped { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            RemapEntry::Mapped { .. } => "mapped",
            RemapEntry::Unmapped => "unmapped",
        }
    }
}

/// Cache usage counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Stepwise searches actually performed
    pub searches: u64,
    /// Resolved keys currently held
    pub entries: usize,
}

/// Run-wide memo of stepwise search results
///
/// Safe to share between worker threads. Each key has its own once-cell:
/// concurrent lookups of the same key wait for the first search instead of
/// repeating it, and a resolved entry is never overwritten.
#[derive(Debug, Default)]
pub struct RemapCache {
    entries: RwLock<HashMap<RemapKey, Arc<OnceCell<RemapEntry>>>>,
    hits: AtomicU64,
    searches: AtomicU64,
}

impl RemapCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, key: RemapKey) -> Arc<OnceCell<RemapEntry>> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cell) = entries.get(&key) {
                return Arc::clone(cell);
            }
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(key).or_default())
    }

    /// Look up a resolved key without searching
    pub fn get(&self, key: &RemapKey) -> Option<RemapEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).and_then(|cell| cell.get().copied())
    }

    /// Record a resolution; the first write for a key wins
    ///
    /// Returns `false` if the key was already resolved.
    pub fn insert(&self, key: RemapKey, entry: RemapEntry) -> bool {
        self.cell(key).set(entry).is_ok()
    }

    /// Return the cached entry for `key`, running `resolve` only if there is none
    ///
    /// If `resolve` fails nothing is cached and the error is returned; a later
    /// call will try again.
    pub fn get_or_try_resolve<F, E>(&self, key: RemapKey, resolve: F) -> Result<RemapEntry, E>
    where
        F: FnOnce() -> Result<RemapEntry, E>,
    {
        let cell = self.cell(key);
        if let Some(entry) = cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(*entry);
        }

        let mut searched = false;
        let entry = cell.get_or_try_init(|| {
            searched = true;
            self.searches.fetch_add(1, Ordering::Relaxed);
            resolve()
        })?;
        if !searched {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        Ok(*entry)
    }

    /// Number of resolved keys
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|cell| cell.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// All resolved entries, sorted by key
    pub fn entries(&self) -> Vec<(RemapKey, RemapEntry)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = entries
            .iter()
            .filter_map(|(key, cell)| cell.get().map(|entry| (*key, *entry)))
            .collect();
        out.sort_by_key(|(key, _)| *key);
        out
    }

    /// Write the remap log: header, then `key  new_chr  new_pos  result`
    ///
    /// Unmapped entries are written as `NA  -1  unmapped`.
    pub fn save<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "{}", REMAP_LOG_HEADER)?;
        for (key, entry) in self.entries() {
            match entry {
                RemapEntry::Mapped { chrom, position } => {
                    writeln!(writer, "{}\t{}\t{}\tmapped", key, chrom, position)?
                }
                RemapEntry::Unmapped => writeln!(writer, "{}\tNA\t-1\tunmapped", key)?,
            }
        }
        Ok(())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        crate::core::io::write_atomic(path, |w| self.save(w))
    }

    /// Seed the cache from a remap log written by [`RemapCache::save`]
    ///
    /// A header without four tab-separated columns is an error; malformed
    /// rows are skipped with a warning. Existing entries are kept.
    /// Returns the number of entries added.
    pub fn seed<R: BufRead>(&self, reader: R) -> Result<usize, RemapLogError> {
        let mut lines = reader.lines();
        let header = lines.next().ok_or(RemapLogError::MissingHeader)??;
        let found = header.trim_end_matches(['\r', '\n']).split('\t').count();
        if found != 4 {
            return Err(RemapLogError::InvalidHeader { found });
        }

        let mut added = 0;
        for (idx, line) in lines.enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_log_row(line) {
                Ok((key, entry)) => {
                    if self.insert(key, entry) {
                        added += 1;
                    }
                }
                Err(message) => log::warn!("Skipping remap log line {}: {}", idx + 2, message),
            }
        }
        Ok(added)
    }

    pub fn seed_from_path<P: AsRef<Path>>(&self, path: P) -> Result<usize, RemapLogError> {
        self.seed(BufReader::new(File::open(path)?))
    }
}

fn parse_log_row(line: &str) -> Result<(RemapKey, RemapEntry), String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 4 {
        return Err(format!("expected 4 columns, found {}", fields.len()));
    }
    let key: RemapKey = fields[0].parse()?;
    let entry = match fields[3] {
        "mapped" => {
            let chrom = Chrom::parse(fields[1])
                .ok_or_else(|| format!("invalid chromosome {:?}", fields[1]))?;
            let position = fields[2]
                .parse()
                .map_err(|_| format!("invalid position {:?}", fields[2]))?;
            RemapEntry::Mapped { chrom, position }
        }
        "unmapped" => RemapEntry::Unmapped,
        other => return Err(format!("unknown result {:?}", other)),
    };
    Ok((key, entry))
}

/// Stepwise search parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapSettings {
    step_size: u64,
    steps: u64,
}

impl RemapSettings {
    pub fn new(step_size: u64, steps: u64) -> Self {
        Self { step_size, steps }
    }

    /// Derive the step count from a search range in kilobases
    ///
    /// `steps = ceil(range_kb * 1000 / step_size)`
    ///
    /// # Examples
    /// ```
    /// use segment_liftover::core::RemapSettings;
    ///
    /// let settings = RemapSettings::from_range(400, 10).unwrap();
    /// assert_eq!(settings.steps(), 25);
    /// assert!(RemapSettings::from_range(0, 10).is_err());
    /// ```
    pub fn from_range(step_size: i64, range_kb: i64) -> ConfigResult<Self> {
        if step_size <= 0 {
            return Err(ConfigError::InvalidStepSize(step_size));
        }
        if range_kb <= 0 {
            return Err(ConfigError::InvalidRange(range_kb));
        }
        let step = step_size as u64;
        let range = (range_kb as u64).saturating_mul(1000);
        let steps = range.div_ceil(step);
        if steps > MAX_STEPS {
            return Err(ConfigError::TooManySteps { steps, max: MAX_STEPS });
        }
        Ok(Self::new(step, steps))
    }

    pub fn step_size(&self) -> u64 {
        self.step_size
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Nominal search radius in bases (`step_size * steps`)
    pub fn radius(&self) -> u64 {
        self.step_size.saturating_mul(self.steps)
    }

    /// Neighbour positions to probe, nearest first
    ///
    /// For `k = 1 .. steps-1`: `position + k·step`, then `position - k·step`.
    /// Offsets that would fall below zero are skipped.
    ///
    /// # Examples
    /// ```
    /// use segment_liftover::core::RemapSettings;
    ///
    /// let settings = RemapSettings::new(100, 4);
    /// assert_eq!(settings.candidates(250), vec![350, 150, 450, 50, 550]);
    /// ```
    pub fn candidates(&self, position: u64) -> Vec<u64> {
        let wanted = self.steps.saturating_sub(1).min(MAX_STEPS) as usize;
        let mut out = Vec::with_capacity(2 * wanted);
        for k in 1..self.steps {
            let Some(offset) = k.checked_mul(self.step_size) else {
                break;
            };
            if let Some(up) = position.checked_add(offset) {
                out.push(up);
            }
            if let Some(down) = position.checked_sub(offset) {
                out.push(down);
            }
        }
        out
    }
}

impl Default for RemapSettings {
    fn default() -> Self {
        Self::new(
            DEFAULT_STEP_SIZE as u64,
            (DEFAULT_RANGE_KB as u64 * 1000).div_ceil(DEFAULT_STEP_SIZE as u64),
        )
    }
}

/// Resolution of one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub id: u64,
    pub entry: RemapEntry,
}

/// Resolves positions the engine could not translate directly
pub struct UnmappableResolver<'a> {
    engine: &'a dyn TranslationService,
    cache: &'a RemapCache,
    settings: RemapSettings,
}

impl<'a> UnmappableResolver<'a> {
    pub fn new(
        engine: &'a dyn TranslationService,
        cache: &'a RemapCache,
        settings: RemapSettings,
    ) -> Self {
        Self {
            engine,
            cache,
            settings,
        }
    }

    /// Resolve every query, consulting the cache first
    ///
    /// Never fails: positions that cannot be resolved come back `Unmapped`.
    pub fn resolve(&self, queries: &[PointQuery]) -> Vec<Resolved> {
        let resolved: Vec<Resolved> = queries
            .iter()
            .map(|q| Resolved {
                id: q.id,
                entry: self.resolve_one(q),
            })
            .collect();

        let mapped = resolved.iter().filter(|r| r.entry.is_mapped()).count();
        log::info!("Remapped {}/{} positions.", mapped, queries.len());
        resolved
    }

    pub fn resolve_one(&self, query: &PointQuery) -> RemapEntry {
        let key = RemapKey::from(query);
        match self.cache.get_or_try_resolve(key, || self.search(key)) {
            Ok(entry) => {
                if !entry.is_mapped() {
                    log::debug!("Failed to remap {}", key);
                }
                entry
            }
            Err(e) => {
                // Engine failure is not a resolution: leave the key uncached
                log::warn!("Remapping failed, engine error for {}: {}", key, e);
                RemapEntry::Unmapped
            }
        }
    }

    /// Run the stepwise search for `key`, bypassing the cache
    pub fn search(&self, key: RemapKey) -> TranslationResult<RemapEntry> {
        let queries: Vec<PointQuery> = self
            .settings
            .candidates(key.position)
            .into_iter()
            .enumerate()
            .map(|(idx, pos)| PointQuery::new(idx as u64, key.chrom, pos))
            .collect();
        if queries.is_empty() {
            return Ok(RemapEntry::Unmapped);
        }

        let translated = self.engine.translate(&queries)?;

        // Ids are generation indices, so the smallest matching id is the nearest candidate
        let best = translated
            .iter()
            .filter(|t| (t.id as usize) < queries.len() && t.valid_chrom() == Some(key.chrom))
            .min_by_key(|t| t.id);

        Ok(match best {
            Some(t) => RemapEntry::Mapped {
                chrom: key.chrom,
                position: t.position,
            },
            None => RemapEntry::Unmapped,
        })
    }
}
