//! Reference-list downloader.
//!
//! Pulls a mode's mandatory and optional files from its bucket into the
//! download directory. A missing optional file is only a warning; missing
//! mandatory files fail the run after everything else has been attempted.

use crate::config::IngestConfig;
use crate::error::IngestError;
use equicast_core::storage::ObjectStore;
use equicast_core::Mode;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub bucket: String,
    pub download_dir: PathBuf,
    pub downloaded: Vec<String>,
    pub missing_optional: Vec<String>,
}

pub struct Downloader<'a> {
    store: &'a dyn ObjectStore,
    config: &'a IngestConfig,
    download_dir: PathBuf,
}

impl<'a> Downloader<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        config: &'a IngestConfig,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            config,
            download_dir: download_dir.into(),
        }
    }

    pub fn download(&self, mode: Mode) -> Result<DownloadReport, IngestError> {
        fs::create_dir_all(&self.download_dir)
            .map_err(|e| IngestError::io(&self.download_dir, e))?;

        let bucket = self.config.bucket(mode);
        let (mandatory, optional) = self.config.inputs(mode);
        let mut downloaded = Vec::new();
        let mut missing_mandatory = Vec::new();
        let mut missing_optional = Vec::new();

        let wanted = mandatory
            .iter()
            .map(|key| (key, true))
            .chain(optional.iter().map(|key| (key, false)));
        for (key, required) in wanted {
            let target = self.download_dir.join(key);
            match self.store.download(bucket, key, &target) {
                Ok(()) => {
                    info!(bucket, key = key.as_str(), backend = self.store.name(), "downloaded");
                    downloaded.push(key.clone());
                }
                Err(e) if e.is_not_found() && required => missing_mandatory.push(key.clone()),
                Err(e) if e.is_not_found() => {
                    let missing = IngestError::MissingOptionalInput {
                        resource: format!("s3://{bucket}/{key}"),
                    };
                    warn!("{missing}");
                    missing_optional.push(key.clone());
                }
                Err(e) => return Err(e.into()),
            }
        }

        if !missing_mandatory.is_empty() {
            return Err(IngestError::MissingMandatoryInput {
                resource: format!("s3://{bucket}/{{{}}}", missing_mandatory.join(", ")),
            });
        }

        info!(
            %mode,
            downloaded = downloaded.len(),
            missing_optional = missing_optional.len(),
            "download complete"
        );
        Ok(DownloadReport {
            bucket: bucket.to_string(),
            download_dir: self.download_dir.clone(),
            downloaded,
            missing_optional,
        })
    }
}
