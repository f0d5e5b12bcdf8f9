//! Upload boundary.
//!
//! The pipeline only needs the [`Uploader`] capability: `upload(path) -> bool`. Implementations
//! own their transport and must report every failure as `false`; nothing crosses this boundary
//! as an error or panic.
//!
//! [`LocalBucketUploader`] is a filesystem-backed object store: a bucket is a directory, objects
//! are keyed by file name. It is what the CLI uses and what the integration tests exercise. It
//! checks that the resolved credentials file exists and keeps the project and location it was
//! opened for, but a directory has nothing to authenticate against, so neither is sent anywhere.

use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::error::{ConversionError, ConversionResult};
use crate::tfrecord::TFRECORD_EXTENSION;

/// Capability to store one local file in the remote object store.
#[cfg_attr(test, mockall::automock)]
pub trait Uploader: Send + Sync {
    /// Upload `path`. Returns `true` only when the object store confirmed the write.
    fn upload(&self, path: &Path) -> bool;
}

/// Bucket name used when none is configured: `<dataset_name>.tfrecord`.
pub fn default_bucket_name(dataset_name: &str) -> String {
    format!("{dataset_name}.{TFRECORD_EXTENSION}")
}

/// Result of uploading one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub path: PathBuf,
    pub uploaded: bool,
    pub deleted: bool,
}

/// Upload one file, deleting it afterwards only if the upload succeeded and `delete_after_success`.
pub fn upload_one(uploader: &dyn Uploader, path: &Path, delete_after_success: bool) -> UploadOutcome {
    let uploaded = uploader.upload(path);
    if !uploaded {
        tracing::error!(path = %path.display(), "failed while uploading file");
    }

    let deleted = uploaded
        && delete_after_success
        && match std::fs::remove_file(path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "uploaded file could not be deleted");
                false
            }
        };

    UploadOutcome {
        path: path.to_path_buf(),
        uploaded,
        deleted,
    }
}

/// Object store emulated on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBucketUploader {
    bucket_dir: PathBuf,
    credentials: Option<PathBuf>,
    project_id: Option<String>,
    location: Option<String>,
}

impl LocalBucketUploader {
    /// Open bucket `bucket_name` under `root`, creating it if it does not exist yet.
    pub fn open(root: impl AsRef<Path>, bucket_name: &str) -> ConversionResult<Self> {
        if bucket_name.is_empty() || bucket_name.contains(['/', '\\']) {
            return Err(ConversionError::config(format!("invalid bucket name '{bucket_name}'")));
        }
        let bucket_dir = root.as_ref().join(bucket_name);
        if !bucket_dir.is_dir() {
            tracing::info!(bucket = %bucket_dir.display(), "bucket not found, creating it");
            std::fs::create_dir_all(&bucket_dir)?;
        }
        Ok(Self {
            bucket_dir,
            credentials: None,
            project_id: None,
            location: None,
        })
    }

    /// Open the default bucket for `config` under `root`.
    ///
    /// `credentials` is the path from [`RunConfig::resolve_credentials`]. A path that does not
    /// name an existing file is a configuration error.
    pub fn for_config(
        root: impl AsRef<Path>,
        config: &RunConfig,
        credentials: Option<PathBuf>,
    ) -> ConversionResult<Self> {
        if let Some(path) = &credentials {
            if !path.is_file() {
                return Err(ConversionError::config(format!(
                    "credentials file '{}' does not exist",
                    path.display()
                )));
            }
        }
        let options = config.options();
        tracing::debug!(
            project = options.gcp_project_id.as_deref().unwrap_or("<default>"),
            location = options.bucket_location.as_deref().unwrap_or("<default>"),
            "opening bucket"
        );
        let bucket = Self::open(root, &default_bucket_name(&config.schema().dataset_name))?;
        Ok(Self {
            credentials,
            project_id: options.gcp_project_id.clone(),
            location: options.bucket_location.clone(),
            ..bucket
        })
    }

    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }

    pub fn credentials(&self) -> Option<&Path> {
        self.credentials.as_deref()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    fn try_upload(&self, path: &Path) -> ConversionResult<PathBuf> {
        let Some(name) = path.file_name() else {
            return Err(ConversionError::Upload {
                path: path.to_path_buf(),
                message: "path has no file name".to_string(),
            });
        };
        let dest = self.bucket_dir.join(name);
        // Copy under a temporary name so a partially written object is never visible.
        let partial = self.bucket_dir.join(format!(".{}.partial", name.to_string_lossy()));
        std::fs::copy(path, &partial)
            .and_then(|_| std::fs::rename(&partial, &dest))
            .map_err(|e| {
                let _ = std::fs::remove_file(&partial);
                ConversionError::Upload {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            })?;
        Ok(dest)
    }
}

impl Uploader for LocalBucketUploader {
    fn upload(&self, path: &Path) -> bool {
        match self.try_upload(path) {
            Ok(dest) => {
                tracing::debug!(path = %path.display(), object = %dest.display(), "uploaded");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "upload failed");
                false
            }
        }
    }
}
