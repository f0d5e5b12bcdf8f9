//! Row → [`Record`] assembly.

use crate::error::{ConversionError, ConversionResult};
use crate::types::{Record, Schema};

use super::feature::encode_column;

/// Build a [`Record`] from one raw row.
///
/// Row fields are matched to schema columns by position only. The resulting record has exactly
/// one feature per column, keyed by column name.
///
/// Fails with [`ConversionError::ArityMismatch`] when the row and schema lengths differ, and
/// with [`ConversionError::Encoding`] when a value does not parse as its column type.
pub fn build<S: AsRef<str>>(row: &[S], schema: &Schema) -> ConversionResult<Record> {
    if row.len() != schema.columns.len() {
        return Err(ConversionError::ArityMismatch {
            expected: schema.columns.len(),
            actual: row.len(),
        });
    }

    row.iter()
        .zip(&schema.columns)
        .map(|(raw, column)| {
            encode_column(&column.name, raw.as_ref(), column.feature_type)
                .map(|feature| (column.name.clone(), feature))
        })
        .collect()
}
