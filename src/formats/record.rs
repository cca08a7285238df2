//! Shared record converter plumbing
//!
//! A [`RecordConverter`] turns one input table into one output table plus
//! the list of records it excluded. Reading, converting and writing are
//! separate so the conversion itself can run on in-memory tables.

use crate::core::error::{ConversionError, ConversionResult};
use crate::core::lift::EndpointLifter;
use crate::core::stats::{ConversionOutcome, KindCounts, RecordKind};
use crate::core::Chrom;
use crate::formats::table::{is_missing, Table};
use std::path::Path;

/// Header of the excluded-records log
pub const UNMAPPED_LOG_HEADER: &str = "chromosome\tstart\tend\tsame_chr\tlength_ratio\tfile";

/// Written in place of an undefined end or ratio
pub const SENTINEL: &str = "-1";

/// A record left out of the output table
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedRecord {
    pub chrom: Chrom,
    pub start: u64,
    /// Original stop; `None` for probes
    pub end: Option<u64>,
    pub same_chrom: bool,
    pub ratio: Option<f64>,
    pub outcome: ConversionOutcome,
}

impl ExcludedRecord {
    /// One excluded-records log line (without newline)
    pub fn log_line(&self, source: &Path) -> String {
        let end = self
            .end
            .map_or_else(|| SENTINEL.to_string(), |e| e.to_string());
        let ratio = self
            .ratio
            .map_or_else(|| SENTINEL.to_string(), |r| format!("{:.4}", r));
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom.ucsc_name(),
            self.start,
            end,
            self.same_chrom,
            ratio,
            source.display()
        )
    }
}

/// Result of converting one table
#[derive(Debug, Clone)]
pub struct FileConversion {
    pub kind: RecordKind,
    pub table: Table,
    pub excluded: Vec<ExcludedRecord>,
    pub counts: KindCounts,
}

/// Largest coordinate whose 1-base interval `[p, p+1)` is representable
pub const MAX_COORDINATE: u64 = u64::MAX - 1;

/// Parse a coordinate; integral floats such as `1000.0` are accepted
///
/// Values above [`MAX_COORDINATE`] are rejected like unparsable ones.
pub fn parse_coordinate(value: &str) -> Option<u64> {
    let value = value.trim();
    let parsed = match value.parse::<u64>() {
        Ok(v) => Some(v),
        Err(_) => match value.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v < u64::MAX as f64 => {
                Some(v as u64)
            }
            _ => None,
        },
    };
    parsed.filter(|&v| v <= MAX_COORDINATE)
}

/// Required identifier and chromosome of a row, `None` if the row is filtered out
pub fn required_chrom(row: &[String]) -> Option<Chrom> {
    let id = row.first()?;
    if is_missing(id) {
        return None;
    }
    Chrom::parse(row.get(1)?)
}

/// Converts one kind of table
pub trait RecordConverter: Send + Sync {
    fn kind(&self) -> RecordKind;

    /// First payload column (everything before it is id, chromosome and coordinates)
    fn payload_from(&self) -> usize;

    /// Convert an in-memory table; `source` only labels logs and errors
    fn convert_table(
        &self,
        table: Table,
        lifter: &EndpointLifter<'_>,
        source: &Path,
    ) -> ConversionResult<FileConversion>;

    /// Read `input`, convert it, and write the output table atomically
    ///
    /// On any error nothing is written to `output`.
    fn convert_file(
        &self,
        input: &Path,
        output: &Path,
        lifter: &EndpointLifter<'_>,
    ) -> ConversionResult<FileConversion> {
        let table = Table::open(input).map_err(|source| ConversionError::Table {
            path: input.to_path_buf(),
            source,
        })?;
        let conversion = self.convert_table(table, lifter, input)?;
        conversion
            .table
            .write_to_path(output, self.payload_from())
            .map_err(|source| ConversionError::Write {
                path: output.to_path_buf(),
                source,
            })?;
        Ok(conversion)
    }
}
