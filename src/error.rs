use std::path::PathBuf;

use thiserror::Error;

use crate::types::FeatureType;

/// Convenience result type for conversion operations.
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Error type returned across the conversion pipeline.
///
/// A single enum is shared by configuration loading, reading, encoding, serialization and
/// upload. Variants fall into three groups:
///
/// - pre-flight: [`ConversionError::Config`] and [`ConversionError::Schema`] stop the process
///   before any file is touched;
/// - per unit: [`ConversionError::ArityMismatch`], [`ConversionError::Encoding`],
///   [`ConversionError::MaxErrorExceeded`] and [`ConversionError::Upload`] are isolated to the
///   row or file they concern and only surface as counts;
/// - transport: wrapped I/O, CSV, glob and codec failures.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Invalid paths, flags or tunables.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The metadata document is missing, malformed or describes an unusable schema.
    #[error("schema error: {message}")]
    Schema { message: String },

    /// A row does not have one field per schema column.
    #[error("row has {actual} fields but the schema declares {expected} columns")]
    ArityMismatch { expected: usize, actual: usize },

    /// A raw value could not be encoded as the column's [`FeatureType`].
    #[error("failed to encode column '{column}' as {feature_type}: {message} (raw='{raw}')")]
    Encoding {
        column: String,
        feature_type: FeatureType,
        raw: String,
        message: String,
    },

    /// A file produced more recoverable errors than the configured tolerance.
    #[error("{errors} errors in '{}' exceed max_error={max_error}", path.display())]
    MaxErrorExceeded {
        path: PathBuf,
        errors: usize,
        max_error: i64,
    },

    /// A single file could not be uploaded.
    #[error("failed to upload '{}': {message}", path.display())]
    Upload { path: PathBuf, message: String },

    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-text tokenizer error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The source pattern could not be expanded.
    #[error("glob error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A frame payload is not a valid `tf.train.Example`.
    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A TFRecord frame is truncated or fails its checksum.
    #[error("corrupt frame at offset {offset}: {message}")]
    CorruptFrame { offset: u64, message: String },

    /// The worker thread pool could not be started.
    #[error("worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl ConversionError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Whether this error is raised before any conversion or upload work starts.
    pub fn is_preflight(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Schema { .. })
    }
}
