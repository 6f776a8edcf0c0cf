//! Artifact uploader.
//!
//! Key layout by mode:
//! - `generic`: `<file name>`
//! - `stock`: `ticker=<parent dir>/<file name>`
//! - `fx`: `fxpair=<file stem>/<fx artifact name>`
//!
//! An optional prefix is prepended to every key. Per-file failures are
//! recorded and reported; they do not stop the remaining uploads.

use crate::error::IngestError;
use crate::files::collect_files;
use crate::summary::GithubReport;
use equicast_core::storage::ObjectStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Generic,
    Stock,
    Fx,
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UploadMode::Generic => "generic",
            UploadMode::Stock => "stock",
            UploadMode::Fx => "fx",
        })
    }
}

impl FromStr for UploadMode {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(UploadMode::Generic),
            "stock" => Ok(UploadMode::Stock),
            "fx" => Ok(UploadMode::Fx),
            other => Err(IngestError::InvalidArgument(format!(
                "unknown upload mode '{other}': expected generic, stock or fx"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub directory: PathBuf,
    pub pattern: String,
    pub message: String,
    pub bucket: String,
    pub mode: UploadMode,
    pub prefix: String,
    pub fx_artifact_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Keys written.
    pub uploaded: Vec<String>,
    /// `(key, error)` for uploads that failed.
    pub failed: Vec<(String, String)>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Uploader<'a> {
    store: &'a dyn ObjectStore,
    github: GithubReport,
}

impl<'a> Uploader<'a> {
    pub fn new(store: &'a dyn ObjectStore, github: GithubReport) -> Self {
        Self { store, github }
    }

    pub fn upload(&self, request: &UploadRequest) -> Result<UploadReport, IngestError> {
        let files = collect_files(&request.directory, &request.pattern)?;
        if files.is_empty() {
            warn!(
                directory = %request.directory.display(),
                pattern = %request.pattern,
                "no files found matching pattern"
            );
            return Ok(UploadReport::default());
        }

        let mut report = UploadReport::default();
        for file in &files {
            let key = object_key(request, file)?;
            match self.store.upload(file, &request.bucket, &key) {
                Ok(()) => {
                    info!(bucket = %request.bucket, key = %key, "uploaded {}", file.display());
                    report.uploaded.push(key);
                }
                Err(e) => {
                    error!(bucket = %request.bucket, key = %key, error = %e, "upload failed");
                    report.failed.push((key, e.to_string()));
                }
            }
        }

        if report.is_complete() {
            info!(count = report.uploaded.len(), bucket = %request.bucket, "all files uploaded");
        } else {
            warn!(
                uploaded = report.uploaded.len(),
                failed = report.failed.len(),
                "upload failed for some files"
            );
        }

        self.github
            .append_summary(&summary_markdown(request, &report))?;
        self.github.set_outputs(&[
            ("uploaded_count", report.uploaded.len().to_string()),
            ("failed_count", report.failed.len().to_string()),
        ])?;
        Ok(report)
    }
}

/// Object key for `file` under the request's mode and prefix.
pub fn object_key(request: &UploadRequest, file: &Path) -> Result<String, IngestError> {
    let name = |p: Option<&std::ffi::OsStr>| {
        p.and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                IngestError::InvalidArgument(format!(
                    "cannot derive object key from '{}'",
                    file.display()
                ))
            })
    };

    let key = match request.mode {
        UploadMode::Generic => name(file.file_name())?,
        UploadMode::Stock => {
            let ticker = name(file.parent().and_then(Path::file_name))?;
            format!("ticker={ticker}/{}", name(file.file_name())?)
        }
        UploadMode::Fx => {
            let pair = name(file.file_stem())?;
            format!("fxpair={pair}/{}", request.fx_artifact_name)
        }
    };

    let prefix = request.prefix.trim_matches('/');
    Ok(if prefix.is_empty() {
        key
    } else {
        format!("{prefix}/{key}")
    })
}

fn summary_markdown(request: &UploadRequest, report: &UploadReport) -> String {
    let mut md = format!(
        "### ☁️ {}\n**Bucket:** `{}`\n\n| Local File | S3 Key |\n|------------|--------|\n",
        request.message, request.bucket
    );
    for key in &report.uploaded {
        md.push_str(&format!("| ✅ Uploaded | `{key}` |\n"));
    }
    for (key, _) in &report.failed {
        md.push_str(&format!("| ❌ Failed | `{key}` |\n"));
    }
    md
}
