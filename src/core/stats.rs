//! Run-wide conversion statistics
//!
//! Converters count outcomes per file in a plain [`KindCounts`]; the batch
//! merges a file's counts into the shared [`RunStatistics`] only after the
//! file succeeds, so failed files never contribute partial numbers.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Record kind handled by a converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Segment,
    Probe,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Segment => "segment",
            RecordKind::Probe => "probe",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one retained record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionOutcome {
    /// Translated directly and validated
    Lifted,
    /// At least one endpoint came from the fallback search, validated
    Remapped,
    /// Translated but implausible
    Rejected,
    /// No translation for some endpoint
    Unmapped,
}

impl ConversionOutcome {
    /// Whether the record is written to the output table
    pub fn is_kept(&self) -> bool {
        matches!(self, ConversionOutcome::Lifted | ConversionOutcome::Remapped)
    }
}

/// Outcome counts for one record kind
///
/// `lifted`, `remapped`, `rejected` and `unmapped` partition `total`.
/// `fallback` cuts across them: records with any endpoint taken from the
/// fallback search, kept or not.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub total: u64,
    pub lifted: u64,
    pub remapped: u64,
    pub rejected: u64,
    pub unmapped: u64,
    pub fallback: u64,
}

impl KindCounts {
    pub fn record(&mut self, outcome: ConversionOutcome) {
        self.total += 1;
        match outcome {
            ConversionOutcome::Lifted => self.lifted += 1,
            ConversionOutcome::Remapped => self.remapped += 1,
            ConversionOutcome::Rejected => self.rejected += 1,
            ConversionOutcome::Unmapped => self.unmapped += 1,
        }
    }

    /// Count a record whose start or end came from the fallback search
    pub fn record_fallback(&mut self) {
        self.fallback += 1;
    }

    pub fn merge(&mut self, other: &KindCounts) {
        self.total += other.total;
        self.lifted += other.lifted;
        self.remapped += other.remapped;
        self.rejected += other.rejected;
        self.unmapped += other.unmapped;
        self.fallback += other.fallback;
    }

    /// Every counted record falls in exactly one class
    pub fn is_consistent(&self) -> bool {
        self.lifted + self.remapped + self.rejected + self.unmapped == self.total
            && self.remapped <= self.fallback
            && self.fallback <= self.total
    }
}

impl FromIterator<ConversionOutcome> for KindCounts {
    fn from_iter<I: IntoIterator<Item = ConversionOutcome>>(iter: I) -> Self {
        let mut counts = KindCounts::default();
        for outcome in iter {
            counts.record(outcome);
        }
        counts
    }
}

#[derive(Debug, Default)]
struct AtomicKindCounts {
    total: AtomicU64,
    lifted: AtomicU64,
    remapped: AtomicU64,
    rejected: AtomicU64,
    unmapped: AtomicU64,
    fallback: AtomicU64,
}

impl AtomicKindCounts {
    fn add(&self, counts: &KindCounts) {
        self.total.fetch_add(counts.total, Ordering::Relaxed);
        self.lifted.fetch_add(counts.lifted, Ordering::Relaxed);
        self.remapped.fetch_add(counts.remapped, Ordering::Relaxed);
        self.rejected.fetch_add(counts.rejected, Ordering::Relaxed);
        self.unmapped.fetch_add(counts.unmapped, Ordering::Relaxed);
        self.fallback.fetch_add(counts.fallback, Ordering::Relaxed);
    }

    fn load(&self) -> KindCounts {
        KindCounts {
            total: self.total.load(Ordering::Relaxed),
            lifted: self.lifted.load(Ordering::Relaxed),
            remapped: self.remapped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            unmapped: self.unmapped.load(Ordering::Relaxed),
            fallback: self.fallback.load(Ordering::Relaxed),
        }
    }
}

/// Succeeded / failed file counts for one record kind
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileCounts {
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct AtomicFileCounts {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl AtomicFileCounts {
    fn load(&self) -> FileCounts {
        FileCounts {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Process-wide counters, safe to update from worker threads
#[derive(Debug, Default)]
pub struct RunStatistics {
    segments: AtomicKindCounts,
    probes: AtomicKindCounts,
    segment_files: AtomicFileCounts,
    probe_files: AtomicFileCounts,
    skipped_files: AtomicU64,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self, kind: RecordKind) -> &AtomicKindCounts {
        match kind {
            RecordKind::Segment => &self.segments,
            RecordKind::Probe => &self.probes,
        }
    }

    fn files(&self, kind: RecordKind) -> &AtomicFileCounts {
        match kind {
            RecordKind::Segment => &self.segment_files,
            RecordKind::Probe => &self.probe_files,
        }
    }

    /// Merge the counts of a successfully converted file
    pub fn file_succeeded(&self, kind: RecordKind, counts: &KindCounts) {
        self.records(kind).add(counts);
        self.files(kind).succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_failed(&self, kind: RecordKind) {
        self.files(kind).failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A file that matched neither record kind
    pub fn file_skipped(&self) {
        self.skipped_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self, kind: RecordKind) -> KindCounts {
        self.records(kind).load()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            segments: self.segments.load(),
            probes: self.probes.load(),
            segment_files: self.segment_files.load(),
            probe_files: self.probe_files.load(),
            skipped_files: self.skipped_files.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RunStatistics`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub segments: KindCounts,
    pub probes: KindCounts,
    pub segment_files: FileCounts,
    pub probe_files: FileCounts,
    pub skipped_files: u64,
}

impl RunSummary {
    pub fn failed_files(&self) -> u64 {
        self.segment_files.failed + self.probe_files.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_consistency() {
        let counts: KindCounts = [
            ConversionOutcome::Lifted,
            ConversionOutcome::Lifted,
            ConversionOutcome::Remapped,
            ConversionOutcome::Rejected,
            ConversionOutcome::Unmapped,
        ]
        .into_iter()
        .collect();

        assert_eq!(counts.total, 5);
        assert_eq!(counts.lifted, 2);
        assert!(!counts.is_consistent());

        let mut counts = counts;
        counts.record(ConversionOutcome::Rejected);
        counts.record_fallback();
        counts.record_fallback();
        assert_eq!(counts.rejected, 2);
        assert_eq!(counts.fallback, 2);
        assert!(counts.is_consistent());
    }

    #[test]
    fn test_run_statistics_accumulate_per_kind() {
        let stats = RunStatistics::new();
        let file = KindCounts {
            total: 3,
            lifted: 1,
            remapped: 1,
            rejected: 0,
            unmapped: 1,
            fallback: 2,
        };
        stats.file_succeeded(RecordKind::Segment, &file);
        stats.file_succeeded(RecordKind::Segment, &file);
        stats.file_failed(RecordKind::Probe);
        stats.file_skipped();

        let summary = stats.summary();
        assert_eq!(summary.segments.total, 6);
        assert_eq!(summary.segments.unmapped, 2);
        assert_eq!(summary.segments.fallback, 4);
        assert!(summary.segments.is_consistent());
        assert_eq!(summary.probes, KindCounts::default());
        assert_eq!(summary.segment_files.succeeded, 2);
        assert_eq!(summary.probe_files.failed, 1);
        assert_eq!(summary.skipped_files, 1);
        assert_eq!(summary.failed_files(), 1);
    }

    #[test]
    fn test_summary_serializes() {
        let summary = RunStatistics::new().summary();
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["segments"]["lifted"], 0);
        assert_eq!(json["segments"]["fallback"], 0);
        assert_eq!(json["probe_files"]["failed"], 0);
    }
}
