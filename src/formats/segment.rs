//! Segment tables: `sample_id, chromosome, start, stop, ...`
//!
//! Starts and stops are translated as two independent point batches and
//! joined back by row index. A translated segment is kept only if both ends
//! stay on one chromosome and its length changes by at most a factor of two.

use crate::core::error::{ConversionError, ConversionResult};
use crate::core::lift::{Endpoint, EndpointLifter};
use crate::core::stats::{ConversionOutcome, KindCounts, RecordKind};
use crate::core::translate::PointQuery;
use crate::core::Chrom;
use crate::formats::record::{
    parse_coordinate, required_chrom, ExcludedRecord, FileConversion, RecordConverter,
};
use crate::formats::table::Table;
use std::path::Path;

/// id, chromosome, start, stop
pub const SEGMENT_COLUMNS: usize = 4;

/// Inclusive bounds on translated length / original length
pub const MIN_LENGTH_RATIO: f64 = 0.5;
pub const MAX_LENGTH_RATIO: f64 = 2.0;

/// Translated length over original length, `None` for zero-length originals
pub fn length_ratio(start: u64, stop: u64, new_start: u64, new_stop: u64) -> Option<f64> {
    let original = stop as i128 - start as i128;
    if original == 0 {
        return None;
    }
    let translated = new_stop as i128 - new_start as i128;
    Some(translated as f64 / original as f64)
}

pub fn ratio_in_bounds(ratio: f64) -> bool {
    (MIN_LENGTH_RATIO..=MAX_LENGTH_RATIO).contains(&ratio)
}

/// Classification of one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentVerdict {
    pub outcome: ConversionOutcome,
    /// Translated start and stop, when both endpoints translated
    pub coordinates: Option<(u64, u64)>,
    pub same_chrom: bool,
    pub ratio: Option<f64>,
}

/// Classify a segment from its translated endpoints
///
/// `end` is the translation of the last base (`stop - 1`); the translated
/// stop is one past it.
pub fn classify_segment(
    start: u64,
    stop: u64,
    new_start: Option<&Endpoint>,
    end: Option<&Endpoint>,
) -> SegmentVerdict {
    let (Some(s), Some(e)) = (new_start, end) else {
        return SegmentVerdict {
            outcome: ConversionOutcome::Unmapped,
            coordinates: None,
            same_chrom: false,
            ratio: None,
        };
    };

    let new_stop = e.position + 1;
    let same_chrom = s.same_chrom(e);
    let ratio = length_ratio(start, stop, s.position, new_stop);

    let outcome = if !same_chrom || !ratio.is_some_and(ratio_in_bounds) {
        ConversionOutcome::Rejected
    } else if s.is_fallback() || e.is_fallback() {
        ConversionOutcome::Remapped
    } else {
        ConversionOutcome::Lifted
    };

    SegmentVerdict {
        outcome,
        coordinates: Some((s.position, new_stop)),
        same_chrom,
        ratio,
    }
}

#[derive(Debug, Clone, Copy)]
struct SegmentRow {
    index: usize,
    chrom: Chrom,
    start: u64,
    stop: u64,
}

impl SegmentRow {
    /// Rows with a missing field, an invalid chromosome or a zero stop are dropped
    fn parse(index: usize, fields: &[String]) -> Option<Self> {
        let chrom = required_chrom(fields)?;
        let start = parse_coordinate(fields.get(2)?)?;
        let stop = parse_coordinate(fields.get(3)?)?;
        if stop == 0 {
            return None;
        }
        Some(Self {
            index,
            chrom,
            start,
            stop,
        })
    }

    fn key(&self) -> u64 {
        self.index as u64
    }
}

/// Record converter for segment tables
#[derive(Debug, Clone, Default)]
pub struct SegmentConverter {
    header: Option<[String; 4]>,
}

impl SegmentConverter {
    pub fn new(header: Option<[String; 4]>) -> Self {
        Self { header }
    }
}

impl RecordConverter for SegmentConverter {
    fn kind(&self) -> RecordKind {
        RecordKind::Segment
    }

    fn payload_from(&self) -> usize {
        SEGMENT_COLUMNS
    }

    fn convert_table(
        &self,
        table: Table,
        lifter: &EndpointLifter<'_>,
        source: &Path,
    ) -> ConversionResult<FileConversion> {
        table
            .require_columns(SEGMENT_COLUMNS)
            .map_err(|e| ConversionError::Table {
                path: source.to_path_buf(),
                source: e,
            })?;

        let retained: Vec<SegmentRow> = table
            .rows()
            .iter()
            .enumerate()
            .filter_map(|(idx, fields)| SegmentRow::parse(idx, fields))
            .collect();
        if retained.len() < table.len() {
            log::debug!(
                "{}: dropped {} rows with missing fields or invalid chromosome",
                source.display(),
                table.len() - retained.len()
            );
        }

        let starts: Vec<PointQuery> = retained
            .iter()
            .map(|r| PointQuery::new(r.key(), r.chrom, r.start))
            .collect();
        let ends: Vec<PointQuery> = retained
            .iter()
            .map(|r| PointQuery::new(r.key(), r.chrom, r.stop - 1))
            .collect();

        let new_starts = lifter.lift(&starts)?;
        let new_ends = lifter.lift(&ends)?;

        let mut counts = KindCounts::default();
        let mut rows = Vec::with_capacity(retained.len());
        let mut excluded = Vec::new();

        for row in &retained {
            let new_start = new_starts.get(&row.key());
            let new_end = new_ends.get(&row.key());
            let verdict = classify_segment(row.start, row.stop, new_start, new_end);
            counts.record(verdict.outcome);
            if [new_start, new_end].into_iter().flatten().any(Endpoint::is_fallback) {
                counts.record_fallback();
            }

            match verdict.coordinates {
                Some((new_start, new_stop)) if verdict.outcome.is_kept() => {
                    let mut fields = table.rows()[row.index].clone();
                    fields[2] = new_start.to_string();
                    fields[3] = new_stop.to_string();
                    rows.push(fields);
                }
                _ => {
                    log::debug!(
                        "{}: {:?} segment {}:{}-{}",
                        source.display(),
                        verdict.outcome,
                        row.chrom,
                        row.start,
                        row.stop
                    );
                    excluded.push(ExcludedRecord {
                        chrom: row.chrom,
                        start: row.start,
                        end: Some(row.stop),
                        same_chrom: verdict.same_chrom,
                        ratio: verdict.ratio,
                        outcome: verdict.outcome,
                    });
                }
            }
        }

        let mut output = Table::new(table.header().to_vec(), rows);
        if let Some(names) = &self.header {
            output.rename_leading(names);
        }

        log::info!(
            "{}: {} segments, {} lifted, {} remapped, {} rejected, {} unmapped, {} with fallback",
            source.display(),
            counts.total,
            counts.lifted,
            counts.remapped,
            counts.rejected,
            counts.unmapped,
            counts.fallback
        );

        Ok(FileConversion {
            kind: RecordKind::Segment,
            table: output,
            excluded,
            counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{TranslationError, TranslationResult};
    use crate::core::remap::{RemapCache, RemapSettings};
    use crate::core::translate::{TranslatedPoint, TranslationService};
    use std::collections::HashMap;

    /// Looks positions up in a fixed table; anything else is unmapped
    struct TableEngine(HashMap<u64, (&'static str, u64)>);

    impl TranslationService for TableEngine {
        fn translate(&self, queries: &[PointQuery]) -> TranslationResult<Vec<TranslatedPoint>> {
            Ok(queries
                .iter()
                .filter_map(|q| {
                    self.0
                        .get(&q.position)
                        .map(|(chrom, pos)| TranslatedPoint::new(q.id, *chrom, *pos))
                })
                .collect())
        }
    }

    struct BrokenEngine;

    impl TranslationService for BrokenEngine {
        fn translate(&self, _: &[PointQuery]) -> TranslationResult<Vec<TranslatedPoint>> {
            Err(TranslationError::Failed {
                program: "liftOver".into(),
                status: "exit status: 1".to_string(),
            })
        }
    }

    fn table(rows: &[&[&str]]) -> Table {
        let header = ["sample_id", "chromosome", "start", "stop", "value"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect();
        Table::new(header, rows)
    }

    fn convert(engine: &TableEngine, input: Table) -> FileConversion {
        let cache = RemapCache::new();
        let lifter = EndpointLifter::new(engine, &cache, RemapSettings::new(400, 25), true);
        SegmentConverter::default()
            .convert_table(input, &lifter, Path::new("segments.tab"))
            .unwrap()
    }

    #[test]
    fn test_lifted_segment() {
        let engine = TableEngine(HashMap::from([
            (1000, ("chr1", 2000)),
            (4999, ("chr1", 5999)),
        ]));
        let result = convert(&engine, table(&[&["sample1", "1", "1000", "5000", "0.25"]]));

        assert_eq!(result.counts.lifted, 1);
        assert_eq!(result.table.rows()[0], ["sample1", "1", "2000", "6000", "0.25"]);
        assert!(result.excluded.is_empty());
    }

    #[test]
    fn test_remapped_segment() {
        // 4999 is unmapped; the first candidate 5399 maps to 6399
        let engine = TableEngine(HashMap::from([
            (1000, ("chr1", 2000)),
            (5399, ("chr1", 6399)),
        ]));
        let result = convert(&engine, table(&[&["sample1", "1", "1000", "5000", "x"]]));

        assert_eq!(result.counts.remapped, 1);
        assert_eq!(result.counts.fallback, 1);
        assert_eq!(result.table.rows()[0][2..4], ["2000", "6400"]);
    }

    #[test]
    fn test_rejected_segment_counts_fallback() {
        // The end falls back to 5399, but the new length is far out of bounds
        let engine = TableEngine(HashMap::from([
            (1000, ("chr1", 2000)),
            (5399, ("chr1", 60_000_000)),
        ]));
        let result = convert(
            &engine,
            table(&[
                &["sample1", "1", "1000", "5000", "x"],
                &["sample2", "1", "1000", "5400", "y"],
            ]),
        );

        assert_eq!(result.counts.rejected, 2);
        assert_eq!(result.counts.remapped, 0);
        // Only sample1 needed the fallback search
        assert_eq!(result.counts.fallback, 1);
        assert!(result.counts.is_consistent());
    }

    #[test]
    fn test_rejected_chromosome_change() {
        let engine = TableEngine(HashMap::from([
            (1000, ("chr2", 2000)),
            (4999, ("chr1", 5999)),
        ]));
        let result = convert(&engine, table(&[&["sample1", "1", "1000", "5000", "x"]]));

        assert_eq!(result.counts.rejected, 1);
        assert!(result.table.is_empty());
        assert!(!result.excluded[0].same_chrom);
        assert!(result.excluded[0]
            .log_line(Path::new("f"))
            .starts_with("chr1\t1000\t5000\tfalse\t"));
    }

    #[test]
    fn test_unmapped_segment() {
        // No candidate around 4999 is in the table
        let engine = TableEngine(HashMap::from([(1001, ("chr1", 2001))]));
        let result = convert(&engine, table(&[&["sample1", "1", "1001", "5000", "x"]]));

        assert_eq!(result.counts.unmapped, 1);
        assert_eq!(result.excluded[0].ratio, None);
        assert_eq!(result.excluded[0].outcome, ConversionOutcome::Unmapped);
    }

    #[test]
    fn test_invalid_rows_are_not_counted() {
        let engine = TableEngine(HashMap::from([
            (10, ("chr23", 110)),
            (19, ("chrX", 119)),
        ]));
        let result = convert(
            &engine,
            table(&[
                &["s1", "23", "10", "20", "a"],
                &["s2", "M", "10", "20", "b"],
                &["s3", "1", "NA", "20", "c"],
                &["s4", "2", "10"],
            ]),
        );

        assert_eq!(result.counts.total, 1);
        assert_eq!(result.counts.lifted, 1);
        // Original chromosome is written verbatim
        assert_eq!(result.table.rows()[0], ["s1", "23", "110", "120", "a"]);
    }

    #[test]
    fn test_header_override_and_too_few_columns() {
        let engine = TableEngine(HashMap::new());
        let cache = RemapCache::new();
        let lifter = EndpointLifter::new(&engine, &cache, RemapSettings::default(), false);
        let names = ["id", "chr", "begin", "end"].map(String::from);

        let out = SegmentConverter::new(Some(names))
            .convert_table(table(&[]), &lifter, Path::new("s.tab"))
            .unwrap();
        assert_eq!(out.table.header(), ["id", "chr", "begin", "end", "value"]);

        let narrow = Table::new(vec!["a".into(), "b".into()], vec![]);
        assert!(matches!(
            SegmentConverter::default().convert_table(narrow, &lifter, Path::new("s.tab")),
            Err(ConversionError::Table { .. })
        ));
    }

    #[test]
    fn test_engine_failure_fails_file() {
        let cache = RemapCache::new();
        let lifter = EndpointLifter::new(&BrokenEngine, &cache, RemapSettings::default(), true);
        let result = SegmentConverter::default().convert_table(
            table(&[&["s1", "1", "10", "20", "a"]]),
            &lifter,
            Path::new("s.tab"),
        );
        assert!(matches!(result, Err(ConversionError::Translation(_))));
    }

    #[test]
    fn test_ratio_bounds_inclusive() {
        let a = Endpoint::direct("chr1", 0);
        // original length 1000; translated stop = end + 1
        let at = |end: u64| classify_segment(0, 1000, Some(&a), Some(&Endpoint::direct("chr1", end)));
        assert_eq!(at(499).outcome, ConversionOutcome::Lifted);
        assert_eq!(at(1999).outcome, ConversionOutcome::Lifted);
        assert_eq!(at(489).outcome, ConversionOutcome::Rejected);
        assert_eq!(at(2009).outcome, ConversionOutcome::Rejected);
    }

    #[test]
    fn test_zero_length_original_is_rejected() {
        let s = Endpoint::direct("chr1", 50);
        let e = Endpoint::direct("chr1", 60);
        let verdict = classify_segment(100, 100, Some(&s), Some(&e));
        assert_eq!(verdict.outcome, ConversionOutcome::Rejected);
        assert_eq!(verdict.ratio, None);
    }
}
