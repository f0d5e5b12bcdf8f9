//! Run configuration: the metadata document plus conversion/upload tunables.
//!
//! A [`RunConfig`] is built once at startup (usually via [`RunConfig::load`]) and passed by
//! reference to every component. All validation happens here, before any file is discovered.
//!
//! ```no_run
//! use tfrecord_converter::config::RunConfig;
//!
//! # fn main() -> Result<(), tfrecord_converter::ConversionError> {
//! let config = RunConfig::load("metadata.json")?;
//! println!("mode={}", config.exec_mode());
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConversionError, ConversionResult};
use crate::tfrecord::CompressionType;
use crate::types::{Column, FileType, Schema};

/// Environment variable consulted for upload credentials when none is given explicitly.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Which phases a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Convert every input file, then upload the produced files.
    ConvertAndUpload,
    /// Convert only.
    Convert,
    /// Upload files already present at the destination.
    Upload,
}

impl ExecMode {
    /// Derive the mode from the two phase flags.
    ///
    /// Setting both flags is rejected.
    pub fn from_flags(only_convert: bool, only_upload: bool) -> ConversionResult<Self> {
        match (only_convert, only_upload) {
            (false, false) => Ok(Self::ConvertAndUpload),
            (true, false) => Ok(Self::Convert),
            (false, true) => Ok(Self::Upload),
            (true, true) => Err(ConversionError::config(
                "only_convert and only_upload cannot both be set",
            )),
        }
    }

    /// Whether the conversion phase runs.
    pub fn converts(self) -> bool {
        matches!(self, Self::ConvertAndUpload | Self::Convert)
    }

    /// Whether the upload phase runs.
    pub fn uploads(self) -> bool {
        matches!(self, Self::ConvertAndUpload | Self::Upload)
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConvertAndUpload => f.write_str("Convert & Upload"),
            Self::Convert => f.write_str("Convert"),
            Self::Upload => f.write_str("Upload"),
        }
    }
}

/// Tunables carried in the `options` object of the metadata document.
///
/// Every field is optional in the document; missing fields take the [`Default`] value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// `GZIP`, `ZLIB`, `NONE` or the empty string.
    pub compression_type: String,
    /// Recoverable errors tolerated per file; `-1` means unlimited.
    pub max_error: i64,
    /// Records per output file.
    pub batch_size: usize,
    /// Upper bound on worker threads.
    pub max_pool_size: usize,
    /// Work units handed to a worker per dispatch.
    pub chunk_size: usize,
    pub only_convert: bool,
    pub only_upload: bool,
    /// Remove local files once their upload succeeded (convert-and-upload runs only).
    pub delete_after_upload: bool,
    pub gcp_project_id: Option<String>,
    pub bucket_location: Option<String>,
    /// Explicit credentials file; takes precedence over [`CREDENTIALS_ENV`].
    pub credentials_path: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            compression_type: "GZIP".to_string(),
            max_error: -1,
            batch_size: 1_000,
            max_pool_size: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            chunk_size: 10,
            only_convert: false,
            only_upload: false,
            delete_after_upload: false,
            gcp_project_id: None,
            bucket_location: None,
            credentials_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetadataDocument {
    name: String,
    #[serde(alias = "dataset_path", alias = "from_path")]
    source_path_pattern: String,
    #[serde(alias = "tfrecord_path", alias = "to_path")]
    destination_path: String,
    #[serde(alias = "mode")]
    file_type: String,
    #[serde(default)]
    skip_header: bool,
    columns: Vec<Column>,
    #[serde(default)]
    options: RunOptions,
}

/// Validated, immutable configuration for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    schema: Schema,
    options: RunOptions,
    compression: CompressionType,
    exec_mode: ExecMode,
}

impl RunConfig {
    /// Load and validate a metadata document.
    ///
    /// Fails with [`ConversionError::Schema`] when the file is missing, is not valid JSON, names
    /// an unknown `feature_type`, or declares no columns; and with [`ConversionError::Config`]
    /// for invalid paths, file type or tunables.
    pub fn load(path: impl AsRef<Path>) -> ConversionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConversionError::schema(format!(
                "cannot read metadata file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate a metadata document held in memory.
    pub fn from_json(text: &str) -> ConversionResult<Self> {
        let doc: MetadataDocument = serde_json::from_str(text)
            .map_err(|e| ConversionError::schema(format!("invalid metadata document: {e}")))?;

        let schema = Schema {
            dataset_name: doc.name,
            source_path_pattern: doc.source_path_pattern,
            destination_path: doc.destination_path,
            file_type: doc.file_type.parse::<FileType>()?,
            skip_header: doc.skip_header,
            columns: doc.columns,
        };
        Self::new(schema, doc.options)
    }

    /// Validate a schema and options pair.
    pub fn new(schema: Schema, options: RunOptions) -> ConversionResult<Self> {
        // Mode flags are checked first so a conflicting invocation fails before anything else.
        let exec_mode = ExecMode::from_flags(options.only_convert, options.only_upload)?;
        validate_schema(&schema)?;

        let compression = options.compression_type.parse::<CompressionType>()?;
        if options.batch_size == 0 {
            return Err(ConversionError::config("batch_size must be > 0"));
        }
        if options.max_pool_size == 0 {
            return Err(ConversionError::config("max_pool_size must be > 0"));
        }
        if options.chunk_size == 0 {
            return Err(ConversionError::config("chunk_size must be > 0"));
        }
        if options.max_error < -1 {
            return Err(ConversionError::config(format!(
                "max_error must be -1 (unlimited) or >= 0, got {}",
                options.max_error
            )));
        }

        Ok(Self {
            schema,
            options,
            compression,
            exec_mode,
        })
    }

    /// Re-validate this configuration with different tunables.
    pub fn with_options(self, options: RunOptions) -> ConversionResult<Self> {
        Self::new(self.schema, options)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    pub fn exec_mode(&self) -> ExecMode {
        self.exec_mode
    }

    pub fn max_error(&self) -> i64 {
        self.options.max_error
    }

    pub fn batch_size(&self) -> usize {
        self.options.batch_size
    }

    /// Whether uploaded files should be removed locally.
    ///
    /// Only honoured in [`ExecMode::ConvertAndUpload`]; uploading pre-existing files never
    /// deletes them.
    pub fn deletes_after_upload(&self) -> bool {
        self.options.delete_after_upload && self.exec_mode == ExecMode::ConvertAndUpload
    }

    /// Resolve the credentials file needed for uploading.
    ///
    /// `env_value` is the value of [`CREDENTIALS_ENV`], if set. The explicit
    /// [`RunOptions::credentials_path`] wins. When the run uploads and neither is available this
    /// is a [`ConversionError::Config`].
    pub fn resolve_credentials(&self, env_value: Option<String>) -> ConversionResult<Option<PathBuf>> {
        if let Some(path) = &self.options.credentials_path {
            return Ok(Some(path.clone()));
        }
        if !self.exec_mode.uploads() {
            return Ok(None);
        }
        match env_value.filter(|v| !v.is_empty()) {
            Some(v) => {
                tracing::info!(path = %v, "using {CREDENTIALS_ENV} for upload credentials");
                Ok(Some(PathBuf::from(v)))
            }
            None => Err(ConversionError::config(format!(
                "no credentials provided: set {CREDENTIALS_ENV} or pass an explicit credentials path"
            ))),
        }
    }

    /// Log the effective configuration.
    pub fn log_summary(&self) {
        tracing::info!(
            exec_mode = %self.exec_mode,
            dataset = %self.schema.dataset_name,
            source = %self.schema.source_path_pattern,
            destination = %self.schema.destination_path,
            file_type = %self.schema.file_type,
            columns = self.schema.columns.len(),
            compression = %self.compression,
            batch_size = self.options.batch_size,
            max_error = self.options.max_error,
            "configuration"
        );
        tracing::info!(
            max_pool_size = self.options.max_pool_size,
            chunk_size = self.options.chunk_size,
            "worker pool"
        );
    }
}

fn validate_schema(schema: &Schema) -> ConversionResult<()> {
    if schema.columns.is_empty() {
        return Err(ConversionError::schema("metadata declares no columns"));
    }
    let mut seen = HashSet::with_capacity(schema.columns.len());
    for column in &schema.columns {
        if !seen.insert(column.name.as_str()) {
            return Err(ConversionError::schema(format!(
                "duplicate column name '{}'",
                column.name
            )));
        }
    }
    if schema.dataset_name.is_empty() {
        return Err(ConversionError::config("dataset name must not be empty"));
    }
    if !schema.destination_path.ends_with('/')
        && !schema.destination_path.ends_with(std::path::MAIN_SEPARATOR)
    {
        return Err(ConversionError::config(format!(
            "destination_path '{}' is not a directory; did you put a separator at the end?",
            schema.destination_path
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureType;

    fn schema() -> Schema {
        Schema {
            dataset_name: "sample".to_string(),
            source_path_pattern: "./data/*.tsv".to_string(),
            destination_path: "./out/".to_string(),
            file_type: FileType::Tsv,
            skip_header: false,
            columns: vec![
                Column::new("first", FeatureType::String),
                Column::new("second", FeatureType::Float),
            ],
        }
    }

    #[test]
    fn exec_mode_follows_flags() {
        assert_eq!(ExecMode::from_flags(false, false).unwrap(), ExecMode::ConvertAndUpload);
        assert_eq!(ExecMode::from_flags(true, false).unwrap(), ExecMode::Convert);
        assert_eq!(ExecMode::from_flags(false, true).unwrap(), ExecMode::Upload);
        assert!(matches!(
            ExecMode::from_flags(true, true),
            Err(ConversionError::Config { .. })
        ));
    }

    #[test]
    fn both_phase_flags_are_rejected_even_with_a_bad_schema() {
        let mut bad = schema();
        bad.columns.clear();
        let opts = RunOptions {
            only_convert: true,
            only_upload: true,
            ..Default::default()
        };
        let err = RunConfig::new(bad, opts).unwrap_err();
        assert!(matches!(err, ConversionError::Config { .. }));
    }

    #[test]
    fn destination_must_be_a_directory() {
        let mut s = schema();
        s.destination_path = "./out/data.tfrecord".to_string();
        let err = RunConfig::new(s, RunOptions::default()).unwrap_err();
        assert!(matches!(err, ConversionError::Config { .. }));
        assert!(err.to_string().contains("is not a directory"));
    }

    #[test]
    fn duplicate_columns_are_a_schema_error() {
        let mut s = schema();
        s.columns.push(Column::new("first", FeatureType::Int));
        let err = RunConfig::new(s, RunOptions::default()).unwrap_err();
        assert!(matches!(err, ConversionError::Schema { .. }));
    }

    #[test]
    fn zero_sized_tunables_are_rejected() {
        for opts in [
            RunOptions { batch_size: 0, ..Default::default() },
            RunOptions { max_pool_size: 0, ..Default::default() },
            RunOptions { chunk_size: 0, ..Default::default() },
            RunOptions { max_error: -2, ..Default::default() },
            RunOptions { compression_type: "LZ4".to_string(), ..Default::default() },
        ] {
            let err = RunConfig::new(schema(), opts).unwrap_err();
            assert!(matches!(err, ConversionError::Config { .. }), "{err}");
        }
    }

    #[test]
    fn credentials_only_required_when_uploading() {
        let convert_only = RunConfig::new(
            schema(),
            RunOptions { only_convert: true, ..Default::default() },
        )
        .unwrap();
        assert_eq!(convert_only.resolve_credentials(None).unwrap(), None);

        let upload = RunConfig::new(schema(), RunOptions::default()).unwrap();
        assert!(matches!(
            upload.resolve_credentials(None),
            Err(ConversionError::Config { .. })
        ));
        assert!(upload.resolve_credentials(Some(String::new())).is_err());
        assert_eq!(
            upload.resolve_credentials(Some("/keys/sa.json".to_string())).unwrap(),
            Some(PathBuf::from("/keys/sa.json"))
        );

        let explicit = RunConfig::new(
            schema(),
            RunOptions {
                credentials_path: Some(PathBuf::from("/explicit.json")),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            explicit.resolve_credentials(Some("/env.json".to_string())).unwrap(),
            Some(PathBuf::from("/explicit.json"))
        );
    }

    #[test]
    fn delete_after_upload_only_applies_to_convert_and_upload() {
        let upload_only = RunConfig::new(
            schema(),
            RunOptions {
                only_upload: true,
                delete_after_upload: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(!upload_only.deletes_after_upload());

        let both = RunConfig::new(
            schema(),
            RunOptions {
                delete_after_upload: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(both.deletes_after_upload());
    }

    #[test]
    fn from_json_accepts_legacy_field_names() {
        let cfg = RunConfig::from_json(
            r#"{
                "name": "legacy",
                "dataset_path": "./in/*.csv",
                "tfrecord_path": "./out/",
                "mode": "csv",
                "columns": [{"name": "a", "feature_type": "int"}]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.schema().source_path_pattern, "./in/*.csv");
        assert_eq!(cfg.schema().file_type, FileType::Csv);
        assert!(!cfg.schema().skip_header);
        assert_eq!(cfg.compression(), CompressionType::Gzip);
        assert_eq!(cfg.max_error(), -1);
    }
}
