use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::error::ConversionResult;
use crate::ingestion::{read_rows, ErrorBudget};
use crate::types::{Record, Schema};

use super::example::build;

/// Records produced from one input file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileConversion {
    pub path: PathBuf,
    pub records: Vec<Record>,
    /// Recoverable errors seen while reading and building (rows that were dropped).
    pub error_count: usize,
}

impl FileConversion {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// Read one file and build a record per row.
///
/// Reading and building share one [`ErrorBudget`]: rows that fail to decode, have the wrong
/// number of fields or contain an unparsable value are dropped and counted. Exhausting the
/// budget aborts the file with [`crate::ConversionError::MaxErrorExceeded`].
pub fn convert_file(path: impl AsRef<Path>, config: &RunConfig) -> ConversionResult<FileConversion> {
    let schema = config.schema();
    convert_file_with(path.as_ref(), schema, config.max_error())
}

pub(crate) fn convert_file_with(path: &Path, schema: &Schema, max_error: i64) -> ConversionResult<FileConversion> {
    let outcome = read_rows(path, schema.file_type, schema.skip_header, max_error)?;
    let mut budget = ErrorBudget::resume(path, max_error, outcome.error_count);

    let mut records = Vec::with_capacity(outcome.rows.len());
    for row in &outcome.rows {
        match build(row, schema) {
            Ok(record) => records.push(record),
            // Row index is not a line number once header/undecodable lines are skipped.
            Err(e) => budget.record(None, &e)?,
        }
    }

    tracing::debug!(
        path = %path.display(),
        records = records.len(),
        errors = budget.count(),
        "converted file"
    );
    Ok(FileConversion {
        path: path.to_path_buf(),
        records,
        error_count: budget.count(),
    })
}
