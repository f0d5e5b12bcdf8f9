//! `tfrecord-converter` turns delimited text datasets (CSV/TSV) into TFRecord files of
//! `tf.train.Example` messages, driven by a JSON metadata document, and optionally hands the
//! written files to an object-store uploader.
//!
//! The primary entrypoints are [`config::RunConfig::load`] and [`scheduler::Scheduler::run`].
//!
//! ## Pipeline
//!
//! 1. **Discover** input files from the source glob ([`ingestion::discover_files`]).
//! 2. **Read** each file into raw rows ([`ingestion::read_rows`]), tolerating up to `max_error`
//!    bad lines per file.
//! 3. **Encode** every row into a [`types::Record`] ([`encoding::build`]), one
//!    [`types::Feature`] per declared column.
//! 4. **Write** records in batches of `batch_size`, one compressed TFRecord file per batch
//!    ([`tfrecord::write_batches`]), named `<name>.<0000>.tfrecord`.
//! 5. **Upload** the written files through an [`upload::Uploader`], optionally deleting them
//!    afterwards.
//!
//! Steps 2-3 run per file on a bounded worker pool ([`execution::ExecutionEngine`]), as does
//! step 5 per output file.
//!
//! ## Metadata
//!
//! ```json
//! {
//!   "name": "chat",
//!   "source_path_pattern": "data/*.tsv",
//!   "destination_path": "out/",
//!   "file_type": "tsv",
//!   "skip_header": true,
//!   "columns": [
//!     { "name": "kind", "feature_type": "str" },
//!     { "name": "ts", "feature_type": "int" },
//!     { "name": "flag", "feature_type": "bool" },
//!     { "name": "text", "feature_type": "bytes" }
//!   ],
//!   "options": { "compression_type": "GZIP", "batch_size": 1000, "only_convert": true }
//! }
//! ```
//!
//! ## Quick example
//!
//! ```no_run
//! use tfrecord_converter::config::RunConfig;
//! use tfrecord_converter::scheduler::Scheduler;
//!
//! # fn main() -> Result<(), tfrecord_converter::ConversionError> {
//! let config = RunConfig::load("metadata.json")?;
//! let summary = Scheduler::new(&config).run()?;
//! println!("records={} files={}", summary.records_converted, summary.files_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The library emits [`tracing`] events and never installs a subscriber; the
//! `tfrecord-converter` binary installs a `tracing-subscriber` formatter filtered by `RUST_LOG`.

pub mod config;
pub mod encoding;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod scheduler;
pub mod tfrecord;
pub mod types;
pub mod upload;

pub use error::{ConversionError, ConversionResult};
