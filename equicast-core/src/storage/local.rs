//! Directory-backed object store: objects live at `{root}/{bucket}/{key}`.

use super::{ensure_parent, ObjectStore, StorageError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location of an object.
    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StorageError> {
        let source = self.object_path(bucket, key);
        if !source.is_file() {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        ensure_parent(local_path)?;
        fs::copy(&source, local_path).map_err(|e| StorageError::Io {
            path: local_path.to_path_buf(),
            source: e,
        })?;
        debug!(bucket, key, path = %local_path.display(), "downloaded object");
        Ok(())
    }

    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        let target = self.object_path(bucket, key);
        ensure_parent(&target)?;
        fs::copy(local_path, &target).map_err(|source| StorageError::Io {
            path: local_path.to_path_buf(),
            source,
        })?;
        debug!(bucket, key, path = %local_path.display(), "uploaded object");
        Ok(())
    }
}
