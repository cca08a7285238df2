//! Tab-delimited tables with a header row
//!
//! Column roles are positional; everything past the coordinate columns is
//! opaque payload carried through unchanged. Numeric payload columns that
//! hold fractional values are written back with fixed 4-decimal precision.

use crate::core::error::{TableError, TableResult};
use crate::core::io::{write_atomic, ByteLineIterator, InputReader};
use memchr::memchr;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Decimal places for fractional numeric columns
pub const FLOAT_PRECISION: usize = 4;

/// Split a line on tabs
pub fn split_fields(line: &[u8]) -> Vec<&[u8]> {
    let mut fields = Vec::with_capacity(8);
    let mut start = 0;
    while let Some(tab) = memchr(b'\t', &line[start..]) {
        fields.push(&line[start..start + tab]);
        start += tab + 1;
    }
    fields.push(&line[start..]);
    fields
}

/// Values treated as missing
pub fn is_missing(value: &str) -> bool {
    matches!(value.trim(), "" | "NA" | "NaN" | "nan" | "null" | "NULL")
}

/// An in-memory table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    /// Parse a table; blank lines are skipped
    ///
    /// A line that is not valid UTF-8 is dropped with a debug message, unless
    /// it is the header.
    pub fn read<R: BufRead>(reader: R) -> TableResult<Self> {
        let mut lines = ByteLineIterator::new(reader);
        let mut header: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line() {
            let line = line?;
            line_no += 1;
            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }

            let parsed: Option<Vec<String>> = split_fields(line)
                .into_iter()
                .map(|f| std::str::from_utf8(f).ok().map(str::to_string))
                .collect();

            match (parsed, header.is_some()) {
                (Some(fields), false) => header = Some(fields),
                (Some(fields), true) => rows.push(fields),
                (None, false) => return Err(TableError::InvalidUtf8(line_no)),
                (None, true) => log::debug!("Skipping non UTF-8 line {}", line_no),
            }
        }

        let header = header.ok_or(TableError::Empty)?;
        Ok(Self { header, rows })
    }

    /// Open a plain or compressed table
    pub fn open<P: AsRef<Path>>(path: P) -> TableResult<Self> {
        Self::read(InputReader::open(path)?)
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fail unless the header has at least `expected` columns
    pub fn require_columns(&self, expected: usize) -> TableResult<()> {
        if self.column_count() < expected {
            return Err(TableError::TooFewColumns {
                expected,
                found: self.column_count(),
            });
        }
        Ok(())
    }

    /// Insert a column at position 0, filling it per row index
    pub fn insert_leading_column<F>(&mut self, name: &str, value: F)
    where
        F: Fn(usize) -> String,
    {
        self.header.insert(0, name.to_string());
        for (idx, row) in self.rows.iter_mut().enumerate() {
            row.insert(0, value(idx));
        }
    }

    /// Replace the first header names
    pub fn rename_leading(&mut self, names: &[String]) {
        for (slot, name) in self.header.iter_mut().zip(names) {
            slot.clone_from(name);
        }
    }

    /// Indices of columns at or after `from` that hold fractional numbers
    ///
    /// A column qualifies when every non-missing value is a finite number
    /// and at least one of them is not an integer literal.
    pub fn float_columns(&self, from: usize) -> Vec<usize> {
        (from..self.column_count())
            .filter(|&col| {
                let mut fractional = false;
                for value in self.rows.iter().filter_map(|r| r.get(col)) {
                    if is_missing(value) {
                        continue;
                    }
                    match value.trim().parse::<f64>() {
                        Ok(v) if v.is_finite() => {
                            if value.trim().parse::<i64>().is_err() {
                                fractional = true;
                            }
                        }
                        _ => return false,
                    }
                }
                fractional
            })
            .collect()
    }

    /// Write the table, formatting fractional columns from `payload_from` on
    pub fn write<W: Write>(&self, writer: &mut W, payload_from: usize) -> io::Result<()> {
        let floats = self.float_columns(payload_from);
        writeln!(writer, "{}", self.header.join("\t"))?;
        for row in &self.rows {
            for (col, value) in row.iter().enumerate() {
                if col > 0 {
                    writer.write_all(b"\t")?;
                }
                match value.trim().parse::<f64>() {
                    Ok(v) if floats.contains(&col) && !is_missing(value) => {
                        write!(writer, "{:.*}", FLOAT_PRECISION, v)?
                    }
                    _ => writer.write_all(value.as_bytes())?,
                }
            }
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Write atomically to `path`
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P, payload_from: usize) -> io::Result<()> {
        write_atomic(path, |w| self.write(w, payload_from))
    }
}
