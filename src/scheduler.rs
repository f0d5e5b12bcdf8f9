//! Run orchestration: discovery, conversion, batching and upload.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RunConfig;
use crate::encoding::convert::convert_file_with;
use crate::error::{ConversionError, ConversionResult};
use crate::execution::{ExecutionEngine, ExecutionObserver, ExecutionOptions, Phase};
use crate::ingestion::discover_files;
use crate::tfrecord::{output_file_pattern, write_batches};
use crate::types::Record;
use crate::upload::{upload_one, Uploader};

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Discovering,
    Converting,
    Uploading,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::Converting => "converting",
            Self::Uploading => "uploading",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_discovered: usize,
    pub files_converted: usize,
    pub files_failed: usize,
    pub records_converted: usize,
    /// Rows dropped by files that still converted.
    pub row_errors: usize,
    pub files_written: usize,
    pub files_uploaded: usize,
    pub upload_failures: usize,
    pub files_deleted: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files={}/{} (failed {}), records={}, row_errors={}, written={}, uploaded={} (failed {}), deleted={}",
            self.files_converted,
            self.files_discovered,
            self.files_failed,
            self.records_converted,
            self.row_errors,
            self.files_written,
            self.files_uploaded,
            self.upload_failures,
            self.files_deleted
        )
    }
}

/// Drives one run of the pipeline for a [`RunConfig`].
pub struct Scheduler<'a> {
    config: &'a RunConfig,
    uploader: Option<Arc<dyn Uploader>>,
    observer: Option<Arc<dyn ExecutionObserver>>,
    state: RunState,
    history: Vec<RunState>,
}

impl<'a> Scheduler<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self {
            config,
            uploader: None,
            observer: None,
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    /// Uploader used by the upload phase. Required when the exec mode uploads.
    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Observer attached to every worker pool this scheduler creates.
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state entered so far, starting with [`RunState::Idle`].
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Run every phase the exec mode asks for.
    ///
    /// Per-file conversion failures and per-file upload failures are counted in the summary.
    /// Anything else (unreadable destination, failed batch write, pool construction) moves the
    /// scheduler to [`RunState::Failed`] and is returned.
    pub fn run(&mut self) -> ConversionResult<RunSummary> {
        match self.run_phases() {
            Ok(summary) => {
                self.transition(RunState::Done);
                tracing::info!(%summary, "run finished");
                Ok(summary)
            }
            Err(e) => {
                self.transition(RunState::Failed);
                tracing::error!(error = %e, "run failed");
                Err(e)
            }
        }
    }

    fn run_phases(&mut self) -> ConversionResult<RunSummary> {
        let mode = self.config.exec_mode();
        if mode.uploads() && self.uploader.is_none() {
            return Err(ConversionError::config(format!("exec mode '{mode}' requires an uploader")));
        }

        let mut summary = RunSummary::default();
        let mut written = None;
        if mode.converts() {
            self.transition(RunState::Discovering);
            let files = self.discover()?;
            summary.files_discovered = files.len();

            self.transition(RunState::Converting);
            written = Some(self.convert(files, &mut summary)?);
        }
        if let Some(uploader) = self.uploader.clone().filter(|_| mode.uploads()) {
            self.transition(RunState::Uploading);
            // Only this run's output is uploaded after a conversion.
            let files = match written {
                Some(paths) => paths,
                None => self.existing_outputs()?,
            };
            self.upload(uploader, files, &mut summary)?;
        }
        Ok(summary)
    }

    fn discover(&self) -> ConversionResult<Vec<PathBuf>> {
        let pattern = &self.config.schema().source_path_pattern;
        let files = discover_files(pattern)?;
        if files.is_empty() {
            tracing::warn!(%pattern, "no input files match the source pattern");
        } else {
            tracing::info!(%pattern, files = files.len(), "discovered input files");
        }
        Ok(files)
    }

    /// Convert `files` and write the batches. Returns the paths written.
    fn convert(&self, files: Vec<PathBuf>, summary: &mut RunSummary) -> ConversionResult<Vec<PathBuf>> {
        let schema = self.config.schema();
        let max_error = self.config.max_error();
        let engine = self.engine(Phase::Convert, files.len())?;

        let mut records: Vec<Record> = Vec::new();
        for result in engine.run(files, |path| convert_file_with(&path, schema, max_error)) {
            match result {
                Ok(conversion) => {
                    summary.files_converted += 1;
                    summary.row_errors += conversion.error_count;
                    records.extend(conversion.records);
                }
                Err(e) => {
                    summary.files_failed += 1;
                    tracing::error!(error = %e, "file skipped");
                }
            }
        }
        summary.records_converted = records.len();

        let written = engine.install(|| {
            write_batches(
                &records,
                schema.destination_dir(),
                &schema.dataset_name,
                self.config.batch_size(),
                self.config.compression(),
            )
        })?;
        summary.files_written = written.len();
        tracing::info!(
            records = summary.records_converted,
            files = summary.files_written,
            destination = %schema.destination_path,
            "wrote output files"
        );
        Ok(written.into_iter().map(|batch| batch.path).collect())
    }

    /// `<name>.*.tfrecord` files already in the destination.
    fn existing_outputs(&self) -> ConversionResult<Vec<PathBuf>> {
        let schema = self.config.schema();
        discover_files(&output_file_pattern(schema.destination_dir(), &schema.dataset_name))
    }

    fn upload(
        &self,
        uploader: Arc<dyn Uploader>,
        files: Vec<PathBuf>,
        summary: &mut RunSummary,
    ) -> ConversionResult<()> {
        if files.is_empty() {
            tracing::warn!(destination = %self.config.schema().destination_path, "no output files to upload");
        }

        let delete = self.config.deletes_after_upload();
        let engine = self.engine(Phase::Upload, files.len())?;
        for outcome in engine.run(files, |path| upload_one(uploader.as_ref(), &path, delete)) {
            if outcome.uploaded {
                summary.files_uploaded += 1;
            } else {
                summary.upload_failures += 1;
            }
            if outcome.deleted {
                summary.files_deleted += 1;
            }
        }
        Ok(())
    }

    fn engine(&self, phase: Phase, units: usize) -> ConversionResult<ExecutionEngine> {
        let engine = ExecutionEngine::new(phase, ExecutionOptions::from_config(self.config), units)?;
        Ok(match &self.observer {
            Some(observer) => engine.with_observer(Arc::clone(observer)),
            None => engine,
        })
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
        self.history.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunOptions;
    use crate::types::{Column, FeatureType, FileType, Schema};
    use crate::upload::MockUploader;
    use std::path::Path;

    fn config(src: &Path, dst: &Path, options: RunOptions) -> RunConfig {
        let schema = Schema {
            dataset_name: "set".to_string(),
            source_path_pattern: format!("{}/*.csv", src.display()),
            destination_path: format!("{}/", dst.display()),
            file_type: FileType::Csv,
            skip_header: false,
            columns: vec![
                Column::new("id", FeatureType::Int),
                Column::new("text", FeatureType::String),
            ],
        };
        RunConfig::new(schema, options).unwrap()
    }

    fn convert_only() -> RunOptions {
        RunOptions {
            only_convert: true,
            batch_size: 2,
            max_pool_size: 2,
            chunk_size: 1,
            compression_type: String::new(),
            ..RunOptions::default()
        }
    }

    #[test]
    fn convert_only_walks_the_expected_states() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("a.csv"), "1,a\n2,b\n3,c\n").unwrap();
        std::fs::write(src.path().join("b.csv"), "x,bad\n").unwrap();

        let cfg = config(src.path(), dst.path(), RunOptions { max_error: 0, ..convert_only() });
        let mut scheduler = Scheduler::new(&cfg);
        let summary = scheduler.run().unwrap();

        assert_eq!(summary.files_discovered, 2);
        assert_eq!(summary.files_converted, 1);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.records_converted, 3);
        assert_eq!(summary.files_written, 2);
        assert_eq!(
            scheduler.history(),
            &[RunState::Idle, RunState::Discovering, RunState::Converting, RunState::Done]
        );
    }

    #[test]
    fn no_input_files_is_not_an_error() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let cfg = config(src.path(), dst.path(), convert_only());
        let summary = Scheduler::new(&cfg).run().unwrap();
        assert_eq!(summary, RunSummary::default());
    }

    #[test]
    fn upload_mode_skips_discovery_and_keeps_files() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::write(dst.path().join("set.0000.tfrecord"), b"").unwrap();
        std::fs::write(dst.path().join("set.0001.tfrecord"), b"").unwrap();
        std::fs::write(dst.path().join("other.0000.tfrecord"), b"").unwrap();

        let options = RunOptions {
            only_upload: true,
            delete_after_upload: true,
            credentials_path: Some("creds.json".into()),
            ..RunOptions::default()
        };
        let cfg = config(src.path(), dst.path(), options);

        let mut uploader = MockUploader::new();
        uploader.expect_upload().times(2).return_const(true);

        let mut scheduler = Scheduler::new(&cfg).with_uploader(Arc::new(uploader));
        let summary = scheduler.run().unwrap();

        assert_eq!(summary.files_uploaded, 2);
        assert_eq!(summary.files_deleted, 0);
        assert!(dst.path().join("set.0000.tfrecord").exists());
        assert_eq!(
            scheduler.history(),
            &[RunState::Idle, RunState::Uploading, RunState::Done]
        );
    }

    #[test]
    fn convert_and_upload_ignores_earlier_outputs() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("a.csv"), "1,a\n2,b\n").unwrap();
        let stale = dst.path().join("set.0005.tfrecord");
        std::fs::write(&stale, b"").unwrap();

        let options = RunOptions {
            batch_size: 2,
            credentials_path: Some("creds.json".into()),
            ..RunOptions::default()
        };
        let cfg = config(src.path(), dst.path(), options);

        let fresh = dst.path().join("set.0000.tfrecord");
        let mut uploader = MockUploader::new();
        uploader
            .expect_upload()
            .withf(move |path| path == fresh.as_path())
            .times(1)
            .return_const(true);

        let summary = Scheduler::new(&cfg).with_uploader(Arc::new(uploader)).run().unwrap();
        assert_eq!(summary.files_written, 1);
        assert_eq!(summary.files_uploaded, 1);
        assert!(stale.exists());
    }

    #[test]
    fn uploading_without_an_uploader_fails() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let cfg = config(src.path(), dst.path(), RunOptions::default());

        let mut scheduler = Scheduler::new(&cfg);
        assert!(matches!(scheduler.run(), Err(ConversionError::Config { .. })));
        assert_eq!(scheduler.state(), RunState::Failed);
    }
}
