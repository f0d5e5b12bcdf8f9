//! Input side of the pipeline.
//!
//! - [`delimited`]: CSV/TSV reader producing raw [`crate::types::Row`]s
//! - [`ErrorBudget`]: per-file tolerance for recoverable errors, shared with
//!   [`crate::encoding::convert_file`]
//! - [`discover_files`]: glob expansion of the source pattern

pub mod budget;
pub mod delimited;

use std::path::PathBuf;

use crate::error::ConversionResult;

pub use budget::ErrorBudget;
pub use delimited::{read_rows, read_rows_from_reader, reader_builder, split_line, ReadOutcome};

/// Expand a glob pattern into a sorted list of regular files.
///
/// `**` matches across directory levels. Entries that cannot be read while walking the pattern
/// are logged and skipped. An empty result is not an error.
pub fn discover_files(pattern: &str) -> ConversionResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in glob::glob(pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "skipping unreadable path"),
        }
    }
    files.sort();
    Ok(files)
}
