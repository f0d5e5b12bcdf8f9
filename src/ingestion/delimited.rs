//! Delimited-text (CSV/TSV) reader.
//!
//! Rules:
//!
//! - The delimiter comes from the [`FileType`] (`,` or tab).
//! - There is no quoting or escaping: a delimiter inside a field is a field separator. This is a
//!   known limitation of the input format, not something the reader tries to repair.
//! - Lines end at `\n`; a `\r` directly before it is dropped, a lone `\r` is field content.
//! - With `skip_header`, the first line is dropped, whatever it contains.
//! - A single trailing empty line (the newline at the end of the file) produces no row. Every
//!   other empty line is a row with one empty field.
//! - Lines that are not valid UTF-8 are recoverable errors, counted against `max_error`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::ConversionResult;
use crate::types::{FileType, Row};

use super::budget::ErrorBudget;

/// Rows read from one file, plus the number of recoverable errors seen while reading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    pub rows: Vec<Row>,
    pub error_count: usize,
}

/// Build a `csv` reader that tokenizes one line: no headers, no quoting, `\n` as the only
/// terminator.
pub fn reader_builder(file_type: FileType) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(file_type.delimiter())
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'));
    builder
}

/// Read a delimited file into raw rows.
///
/// Fails with [`crate::ConversionError::MaxErrorExceeded`] once more than `max_error` lines fail
/// to decode (`-1` = unlimited), and with an I/O error if the file cannot be read. An empty file
/// yields zero rows.
pub fn read_rows(
    path: impl AsRef<Path>,
    file_type: FileType,
    skip_header: bool,
    max_error: i64,
) -> ConversionResult<ReadOutcome> {
    let path = path.as_ref();
    let input = BufReader::new(File::open(path)?);
    let mut budget = ErrorBudget::new(path, max_error);
    let rows = read_rows_from_reader(input, file_type, skip_header, &mut budget)?;
    Ok(ReadOutcome {
        rows,
        error_count: budget.count(),
    })
}

/// Read rows from any buffered input, recording undecodable lines against `budget`.
///
/// `BufRead::split` never yields the empty piece after a final `\n`, which is exactly the one
/// trailing empty line that must not become a row.
pub fn read_rows_from_reader<R: BufRead>(
    input: R,
    file_type: FileType,
    skip_header: bool,
    budget: &mut ErrorBudget,
) -> ConversionResult<Vec<Row>> {
    let mut rows = Vec::new();
    for (idx, line) in input.split(b'\n').enumerate() {
        let mut line = line?;
        if skip_header && idx == 0 {
            continue;
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        match split_line(&line, file_type) {
            Ok(row) => rows.push(row),
            Err(e) => budget.record(Some(idx as u64 + 1), &e)?,
        }
    }
    Ok(rows)
}

/// Split one line (terminator already removed) into its fields.
///
/// An empty line is one empty field. Fails with [`crate::ConversionError::Csv`] when the line is
/// not valid UTF-8.
pub fn split_line(line: &[u8], file_type: FileType) -> ConversionResult<Row> {
    if line.is_empty() {
        return Ok(vec![String::new()]);
    }
    let mut rdr = reader_builder(file_type)
        .buffer_capacity(line.len() + 1)
        .from_reader(line);
    let mut record = csv::StringRecord::new();
    rdr.read_record(&mut record)?;
    Ok(record.iter().map(str::to_owned).collect())
}
