use std::path::{Path, PathBuf};
use std::sync::Arc;

use mockall::mock;
use tfrecord_converter::config::{RunConfig, RunOptions};
use tfrecord_converter::scheduler::{RunState, Scheduler};
use tfrecord_converter::tfrecord::{read_records_from_path, CompressionType};
use tfrecord_converter::types::{Column, Feature, FeatureType, FileType, Schema};
use tfrecord_converter::upload::{LocalBucketUploader, Uploader};

mock! {
    pub Store {}

    impl Uploader for Store {
        fn upload(&self, path: &Path) -> bool;
    }
}

struct Workspace {
    src: tempfile::TempDir,
    dst: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            src: tempfile::tempdir().unwrap(),
            dst: tempfile::tempdir().unwrap(),
        }
    }

    /// Spread `rows` numbered rows over `files` input files.
    fn with_rows(self, files: usize, rows: usize) -> Self {
        let mut contents = vec![String::new(); files];
        for i in 0..rows {
            contents[i % files].push_str(&format!("{i}\trow-{i}\t{i}.25\n"));
        }
        for (f, text) in contents.iter().enumerate() {
            std::fs::write(self.src.path().join(format!("part-{f}.tsv")), text).unwrap();
        }
        self
    }

    fn config(&self, options: RunOptions) -> RunConfig {
        let schema = Schema {
            dataset_name: "numbers".to_string(),
            source_path_pattern: format!("{}/*.tsv", self.src.path().display()),
            destination_path: format!("{}/", self.dst.path().display()),
            file_type: FileType::Tsv,
            skip_header: false,
            columns: vec![
                Column::new("id", FeatureType::Int),
                Column::new("label", FeatureType::String),
                Column::new("score", FeatureType::Float),
            ],
        };
        RunConfig::new(schema, options).unwrap()
    }

    fn output(&self, index: usize) -> PathBuf {
        self.dst.path().join(format!("numbers.{index:04}.tfrecord"))
    }
}

fn options(batch_size: usize) -> RunOptions {
    RunOptions {
        batch_size,
        max_pool_size: 3,
        chunk_size: 1,
        ..RunOptions::default()
    }
}

#[test]
fn twenty_five_records_in_batches_of_ten() {
    let ws = Workspace::new().with_rows(4, 25);
    let config = ws.config(RunOptions {
        only_convert: true,
        ..options(10)
    });

    let summary = Scheduler::new(&config).run().unwrap();
    assert_eq!(summary.files_discovered, 4);
    assert_eq!(summary.files_converted, 4);
    assert_eq!(summary.records_converted, 25);
    assert_eq!(summary.files_written, 3);

    let sizes: Vec<usize> = (0..3)
        .map(|i| read_records_from_path(ws.output(i), CompressionType::Gzip).unwrap().len())
        .collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    assert!(!ws.output(3).exists());
}

#[test]
fn gzip_files_on_disk_decode_to_the_input_values() {
    let ws = Workspace::new().with_rows(1, 3);
    let config = ws.config(RunOptions {
        only_convert: true,
        ..options(100)
    });
    Scheduler::new(&config).run().unwrap();

    let bytes = std::fs::read(ws.output(0)).unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);

    let records = read_records_from_path(ws.output(0), CompressionType::Gzip).unwrap();
    assert_eq!(records.len(), 3);
    let second = &records[1];
    assert_eq!(second.get("id"), Some(&Feature::int64(1)));
    assert_eq!(second.get("label"), Some(&Feature::bytes("row-1")));
    assert_eq!(second.get("score"), Some(&Feature::float(1.25)));
}

#[test]
fn failed_files_are_counted_and_contribute_nothing() {
    let ws = Workspace::new().with_rows(2, 6);
    std::fs::write(ws.src.path().join("broken.tsv"), "x\ty\tz\nnope\n").unwrap();
    let config = ws.config(RunOptions {
        only_convert: true,
        max_error: 0,
        ..options(100)
    });

    let summary = Scheduler::new(&config).run().unwrap();
    assert_eq!(summary.files_discovered, 3);
    assert_eq!(summary.files_failed, 1);
    assert_eq!(summary.records_converted, 6);
}

#[test]
fn convert_and_upload_deletes_only_uploaded_files() {
    let ws = Workspace::new().with_rows(2, 30);
    let config = ws.config(RunOptions {
        delete_after_upload: true,
        ..options(10)
    });

    let failing = ws.output(1);
    let mut store = MockStore::new();
    store
        .expect_upload()
        .times(3)
        .returning(move |path| path != failing.as_path());

    let mut scheduler = Scheduler::new(&config).with_uploader(Arc::new(store));
    let summary = scheduler.run().unwrap();

    assert_eq!(summary.files_written, 3);
    assert_eq!(summary.files_uploaded, 2);
    assert_eq!(summary.upload_failures, 1);
    assert_eq!(summary.files_deleted, 2);
    assert!(!ws.output(0).exists());
    assert!(ws.output(1).exists());
    assert!(!ws.output(2).exists());
    assert_eq!(
        scheduler.history(),
        &[
            RunState::Idle,
            RunState::Discovering,
            RunState::Converting,
            RunState::Uploading,
            RunState::Done
        ]
    );
}

#[test]
fn stale_outputs_are_neither_uploaded_nor_deleted() {
    let ws = Workspace::new().with_rows(1, 4);
    let stale = ws.output(7);
    std::fs::write(&stale, b"left over from an earlier run").unwrap();
    let config = ws.config(RunOptions {
        delete_after_upload: true,
        ..options(2)
    });

    let written = [ws.output(0), ws.output(1)];
    let mut store = MockStore::new();
    store
        .expect_upload()
        .withf(move |path| written.iter().any(|w| w == path))
        .times(2)
        .return_const(true);

    let summary = Scheduler::new(&config).with_uploader(Arc::new(store)).run().unwrap();

    assert_eq!(summary.files_written, 2);
    assert_eq!(summary.files_uploaded, 2);
    assert_eq!(summary.files_deleted, 2);
    assert!(!ws.output(0).exists());
    assert!(!ws.output(1).exists());
    assert!(stale.exists());
}

#[test]
fn conversion_output_lands_in_a_local_bucket() {
    let ws = Workspace::new().with_rows(1, 5);
    let buckets = tempfile::tempdir().unwrap();
    let config = ws.config(options(2));

    let uploader = LocalBucketUploader::for_config(buckets.path(), &config, None).unwrap();
    let summary = Scheduler::new(&config)
        .with_uploader(Arc::new(uploader))
        .run()
        .unwrap();

    assert_eq!(summary.files_uploaded, 3);
    assert_eq!(summary.files_deleted, 0);
    let bucket = buckets.path().join("numbers.tfrecord");
    let records = read_records_from_path(bucket.join("numbers.0002.tfrecord"), CompressionType::Gzip).unwrap();
    assert_eq!(records.len(), 1);
    assert!(ws.output(0).exists());
}
