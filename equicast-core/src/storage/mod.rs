//! Object storage collaborator.
//!
//! The `ObjectStore` trait abstracts over S3 and a local directory so the
//! downloader and uploader can be exercised without network access. A missing
//! object is reported as [`StorageError::NotFound`], distinct from every other
//! failure, so callers can treat mandatory and optional inputs differently.

pub mod local;
pub mod s3;

pub use local::LocalStore;
pub use s3::{S3Settings, S3Store};

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object s3://{bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("local file error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage request for s3://{bucket}/{key} failed: {message}")]
    Backend {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("storage client error: {0}")]
    Client(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Blocking object storage operations.
pub trait ObjectStore: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Fetch `bucket/key` into `local_path`, creating parent directories.
    fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StorageError>;

    /// Store the file at `local_path` under `bucket/key`.
    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StorageError>;
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}
