//! tfrecord-converter - CSV/TSV to TFRecord conversion and upload.
//!
//! Entry point for the CLI application.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tfrecord_converter::config::{RunConfig, CREDENTIALS_ENV};
use tfrecord_converter::execution::{
    CompositeExecutionObserver, ExecutionObserver, ProgressObserver, TracingExecutionObserver,
};
use tfrecord_converter::scheduler::Scheduler;
use tfrecord_converter::upload::LocalBucketUploader;
use tfrecord_converter::ConversionResult;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Convert delimited datasets described by a metadata file into TFRecord files.
///
/// Command-line options override the `options` object of the metadata file.
#[derive(Debug, Parser)]
#[command(name = "tfrecord-converter", version)]
struct Cli {
    /// Metadata JSON describing the dataset and its columns
    #[arg(value_name = "METADATA_PATH")]
    metadata: PathBuf,

    /// Output compression: GZIP, ZLIB or NONE
    #[arg(short = 'c', long = "compression", value_name = "COMPRESSION")]
    compression: Option<String>,

    /// Bad lines tolerated per input file (-1 = unlimited)
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    max_error: Option<i64>,

    /// Convert only, do not upload
    #[arg(long)]
    only_convert: bool,

    /// Upload previously written files only
    #[arg(long)]
    only_upload: bool,

    /// Delete local files after a successful upload
    #[arg(long)]
    delete_after_upload: bool,

    /// Records per output file
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Maximum worker threads
    #[arg(long, value_name = "N")]
    max_pool_size: Option<usize>,

    /// Work units dispatched to a worker at once
    #[arg(long, value_name = "N")]
    chunk_size: Option<usize>,

    /// Project that owns the bucket
    #[arg(long, value_name = "ID")]
    gcp_project_id: Option<String>,

    /// Location used when the bucket is created
    #[arg(long, value_name = "LOC")]
    bucket_location: Option<String>,

    /// Credentials file (defaults to $GOOGLE_APPLICATION_CREDENTIALS)
    #[arg(short = 'g', long = "credentials", value_name = "CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Directory holding the object-store buckets
    #[arg(long, value_name = "DIR", default_value = "buckets")]
    bucket_root: PathBuf,

    /// Do not draw progress bars
    #[arg(long)]
    no_progress: bool,

    /// Debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "aborting");
            eprintln!("Error: {e}");
            if e.is_preflight() {
                ExitCode::from(1)
            } else {
                ExitCode::from(2)
            }
        }
    }
}

fn run(cli: Cli) -> ConversionResult<()> {
    let config = load_config(&cli)?;
    let credentials = config.resolve_credentials(std::env::var(CREDENTIALS_ENV).ok())?;
    config.log_summary();

    let mut observers: Vec<Arc<dyn ExecutionObserver>> = vec![Arc::new(TracingExecutionObserver)];
    if !cli.no_progress {
        observers.push(Arc::new(ProgressObserver::stderr()));
    }

    let mut scheduler =
        Scheduler::new(&config).with_observer(Arc::new(CompositeExecutionObserver::new(observers)));
    if config.exec_mode().uploads() {
        let uploader = LocalBucketUploader::for_config(&cli.bucket_root, &config, credentials)?;
        scheduler = scheduler.with_uploader(Arc::new(uploader));
    }

    let summary = scheduler.run()?;
    println!("{summary}");
    Ok(())
}

fn load_config(cli: &Cli) -> ConversionResult<RunConfig> {
    let config = RunConfig::load(&cli.metadata)?;
    let mut options = config.options().clone();

    if let Some(compression) = &cli.compression {
        options.compression_type = compression.clone();
    }
    if let Some(max_error) = cli.max_error {
        options.max_error = max_error;
    }
    if let Some(batch_size) = cli.batch_size {
        options.batch_size = batch_size;
    }
    if let Some(max_pool_size) = cli.max_pool_size {
        options.max_pool_size = max_pool_size;
    }
    if let Some(chunk_size) = cli.chunk_size {
        options.chunk_size = chunk_size;
    }
    options.only_convert |= cli.only_convert;
    options.only_upload |= cli.only_upload;
    options.delete_after_upload |= cli.delete_after_upload;
    if cli.gcp_project_id.is_some() {
        options.gcp_project_id = cli.gcp_project_id.clone();
    }
    if cli.bucket_location.is_some() {
        options.bucket_location = cli.bucket_location.clone();
    }
    if cli.credentials.is_some() {
        options.credentials_path = cli.credentials.clone();
    }

    config.with_options(options)
}

fn setup_logging(verbose: bool) {
    let default = if verbose {
        "tfrecord_converter=debug,warn"
    } else {
        "tfrecord_converter=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
