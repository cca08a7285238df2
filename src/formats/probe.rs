//! Probe tables: `probe_id, chromosome, position, ...`
//!
//! Tables with fewer than four columns carry no identifier; a `probe_id`
//! column (`ID_0`, `ID_1`, ...) is prepended before conversion.

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

/// id, chromosome, position
pub const PROBE_COLUMNS: usize = 3;

/// Tables narrower than this get a generated id column
pub const MIN_COLUMNS_WITH_ID: usize = 4;

pub const GENERATED_ID_COLUMN: &str = "probe_id";

/// Classify a probe: the translated position must stay on the original chromosome
pub fn classify_probe(chrom: Chrom, translated: Option<&Endpoint>) -> (ConversionOutcome, bool) {
    match translated {
        None => (ConversionOutcome::Unmapped, false),
        Some(ep) if ep.valid_chrom() != Some(chrom) => (ConversionOutcome::Rejected, false),
        Some(ep) if ep.is_fallback() => (ConversionOutcome::Remapped, true),
        Some(_) => (ConversionOutcome::Lifted, true),
    }
}

/// Record converter for probe tables
#[derive(Debug, Clone, Default)]
pub struct ProbeConverter {
    header: Option<[String; 3]>,
}

impl ProbeConverter {
    pub fn new(header: Option<[String; 3]>) -> Self {
        Self { header }
    }
}

impl RecordConverter for ProbeConverter {
    fn kind(&self) -> RecordKind {
        RecordKind::Probe
    }

    fn payload_from(&self) -> usize {
        PROBE_COLUMNS
    }

    fn convert_table(
        &self,
        mut table: Table,
        lifter: &EndpointLifter<'_>,
        source: &Path,
    ) -> ConversionResult<FileConversion> {
        if table.column_count() < MIN_COLUMNS_WITH_ID {
            log::debug!("{}: generating probe ids", source.display());
            table.insert_leading_column(GENERATED_ID_COLUMN, |idx| format!("ID_{}", idx));
        }
        table
            .require_columns(PROBE_COLUMNS)
            .map_err(|e| ConversionError::Table {
                path: source.to_path_buf(),
                source: e,
            })?;

        let retained: Vec<(usize, Chrom, u64)> = table
            .rows()
            .iter()
            .enumerate()
            .filter_map(|(idx, fields)| {
                let chrom = required_chrom(fields)?;
                let position = parse_coordinate(fields.get(2)?)?;
                Some((idx, chrom, position))
            })
            .collect();
        if retained.len() < table.len() {
            log::debug!(
                "{}: dropped {} rows with missing fields or invalid chromosome",
                source.display(),
                table.len() - retained.len()
            );
        }

        let queries: Vec<PointQuery> = retained
            .iter()
            .map(|&(idx, chrom, position)| PointQuery::new(idx as u64, chrom, position))
            .collect();
        let translated = lifter.lift(&queries)?;

        let mut counts = KindCounts::default();
        let mut rows = Vec::with_capacity(retained.len());
        let mut excluded = Vec::new();

        for &(idx, chrom, position) in &retained {
            let endpoint = translated.get(&(idx as u64));
            let (outcome, same_chrom) = classify_probe(chrom, endpoint);
            counts.record(outcome);
            if endpoint.is_some_and(Endpoint::is_fallback) {
                counts.record_fallback();
            }

            match endpoint {
                Some(ep) if outcome.is_kept() => {
                    let mut fields = table.rows()[idx].clone();
                    fields[2] = ep.position.to_string();
                    rows.push(fields);
                }
                _ => {
                    log::debug!(
                        "{}: {:?} probe {}:{}",
                        source.display(),
                        outcome,
                        chrom,
                        position
                    );
                    excluded.push(ExcludedRecord {
                        chrom,
                        start: position,
                        end: None,
                        same_chrom,
                        ratio: None,
                        outcome,
                    });
                }
            }
        }

        let mut output = Table::new(table.header().to_vec(), rows);
        if let Some(names) = &self.header {
            output.rename_leading(names);
        }

        log::info!(
            "{}: {} probes, {} lifted, {} remapped, {} rejected, {} unmapped, {} with fallback",
            source.display(),
            counts.total,
            counts.lifted,
            counts.remapped,
            counts.rejected,
            counts.unmapped,
            counts.fallback
        );

        Ok(FileConversion {
            kind: RecordKind::Probe,
            table: output,
            excluded,
            counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TranslationResult;
    use crate::core::remap::{RemapCache, RemapSettings};
    use crate::core::translate::{TranslatedPoint, TranslationService};
    use std::collections::HashMap;

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

    fn table(header: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            header.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn convert(engine: &TableEngine, fallback: bool, input: Table) -> FileConversion {
        let cache = RemapCache::new();
        let lifter = EndpointLifter::new(engine, &cache, RemapSettings::new(400, 4), fallback);
        ProbeConverter::default()
            .convert_table(input, &lifter, Path::new("probes.tab"))
            .unwrap()
    }

    #[test]
    fn test_probe_outcomes() {
        let engine = TableEngine(HashMap::from([
            (100, ("chr1", 1100)),
            (200, ("chr2", 1200)),
            (700, ("chr1", 1700)),
        ]));
        let input = table(
            &["probe", "chro", "pos", "value"],
            &[
                &["p1", "1", "100", "0.1"],
                &["p2", "1", "200", "0.2"],
                &["p3", "1", "300", "0.3"],
                &["p4", "1", "5000", "0.4"],
            ],
        );
        let result = convert(&engine, true, input);

        assert_eq!(
            result.counts,
            KindCounts {
                total: 4,
                lifted: 1,
                remapped: 1,
                rejected: 1,
                unmapped: 1,
                fallback: 1
            }
        );
        // p3 at 300 falls back to 700 (+400)
        assert_eq!(result.table.rows()[0], ["p1", "1", "1100", "0.1"]);
        assert_eq!(result.table.rows()[1], ["p3", "1", "1700", "0.3"]);
        assert_eq!(
            result.excluded[1].log_line(Path::new("probes.tab")),
            "chr1\t5000\t-1\tfalse\t-1\tprobes.tab"
        );
    }

    #[test]
    fn test_generated_ids() {
        let engine = TableEngine(HashMap::from([(10, ("chrX", 20)), (11, ("chrX", 21))]));
        let input = table(&["chro", "pos", "value"], &[&["X", "10", "1.5"], &["24", "11", "2"]]);
        let result = convert(&engine, false, input);

        assert_eq!(result.table.header(), ["probe_id", "chro", "pos", "value"]);
        assert_eq!(result.table.rows()[0], ["ID_0", "X", "20", "1.5"]);
        // chr24 is Y, but the engine put it on X
        assert_eq!(result.counts.rejected, 1);
    }

    #[test]
    fn test_alias_matches_translated_name() {
        let engine = TableEngine(HashMap::from([(10, ("chrX", 20))]));
        let input = table(&["id", "chro", "pos", "v"], &[&["a", "chr23", "10", "1"]]);
        assert_eq!(convert(&engine, false, input).counts.lifted, 1);
    }

    #[test]
    fn test_fallback_disabled_is_unmapped() {
        let engine = TableEngine(HashMap::from([(700, ("chr1", 1700))]));
        let input = table(&["id", "chro", "pos", "v"], &[&["a", "1", "300", "1"]]);
        let result = convert(&engine, false, input);
        assert_eq!(result.counts.unmapped, 1);
        assert!(result.table.is_empty());
    }

    #[test]
    fn test_header_override() {
        let engine = TableEngine(HashMap::new());
        let cache = RemapCache::new();
        let lifter = EndpointLifter::new(&engine, &cache, RemapSettings::default(), false);
        let converter = ProbeConverter::new(Some(["ID", "CHR", "POS"].map(String::from)));
        let out = converter
            .convert_table(table(&["a", "b", "c", "d"], &[]), &lifter, Path::new("p"))
            .unwrap();
        assert_eq!(out.table.header(), ["ID", "CHR", "POS", "d"]);
    }
}
