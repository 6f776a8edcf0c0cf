//! Error taxonomy for ingestion runs.

use crate::config::ConfigError;
use equicast_core::splitter::SplitError;
use equicast_core::storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the runner.
///
/// Per-item fetch failures never surface here while a sweep is running; they
/// end up in the sweep report and the error log. `FetchFailure` exists for
/// callers that decide a non-empty error map is fatal.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("mandatory input missing: {resource}")]
    MissingMandatoryInput { resource: String },

    #[error("optional input missing: {resource}")]
    MissingOptionalInput { resource: String },

    #[error("{failed} item(s) still failing after {attempts} attempt(s)")]
    FetchFailure { failed: usize, attempts: u32 },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("split error: {0}")]
    Split(#[from] SplitError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

impl IngestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Lift a splitter failure into the runner taxonomy, mapping a missing input
/// file to `MissingMandatoryInput`.
pub(crate) fn from_split(err: SplitError) -> IngestError {
    match err {
        SplitError::MissingInput(path) => IngestError::MissingMandatoryInput {
            resource: path.display().to_string(),
        },
        SplitError::InvalidArgument(msg) => IngestError::InvalidArgument(msg),
        other => IngestError::Split(other),
    }
}
