//! Monthly storage cost estimate for a set of artifacts.

use crate::error::IngestError;
use crate::files::collect_files;
use crate::summary::GithubReport;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// S3 Standard price, USD per GB-month.
pub const RATE_PER_GB: f64 = 0.023;
/// Estimates above this many USD are flagged.
pub const COST_THRESHOLD: f64 = 1.0;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    pub directory: PathBuf,
    pub pattern: String,
    pub files: usize,
    pub total_bytes: u64,
    pub total_gb: f64,
    pub monthly_cost: f64,
    pub over_threshold: bool,
}

impl CostEstimate {
    pub fn from_bytes(directory: PathBuf, pattern: String, files: usize, total_bytes: u64) -> Self {
        let total_gb = total_bytes as f64 / BYTES_PER_GB;
        let monthly_cost = total_gb * RATE_PER_GB;
        Self {
            directory,
            pattern,
            files,
            total_bytes,
            total_gb,
            monthly_cost,
            over_threshold: monthly_cost > COST_THRESHOLD,
        }
    }

    fn color(&self) -> &'static str {
        if self.over_threshold {
            "red"
        } else {
            "green"
        }
    }

    pub fn summary_markdown(&self, message: &str) -> String {
        format!(
            "### 💰 {message}\n\
             | Directory | Pattern | Storage Size (GB) | Estimated Monthly Cost |\n\
             |-----------|---------|-------------------|------------------------|\n\
             | `{}` | `{}` | `{:.6}` | <span style='color: {}'>${:.6}</span> |\n",
            self.directory.display(),
            self.pattern,
            self.total_gb,
            self.color(),
            self.monthly_cost,
        )
    }
}

/// Sum the sizes of matching files. No matches is an error.
pub fn estimate(directory: PathBuf, pattern: &str) -> Result<CostEstimate, IngestError> {
    let files = collect_files(&directory, pattern)?;
    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no files found in {} matching pattern: {pattern}",
            directory.display()
        )));
    }

    let mut total_bytes = 0u64;
    for file in &files {
        total_bytes += fs::metadata(file)
            .map_err(|e| IngestError::io(file, e))?
            .len();
    }

    let estimate = CostEstimate::from_bytes(directory, pattern.to_string(), files.len(), total_bytes);
    info!(
        files = estimate.files,
        size_gb = estimate.total_gb,
        cost_usd = estimate.monthly_cost,
        over_threshold = estimate.over_threshold,
        "estimated storage cost"
    );
    Ok(estimate)
}

/// Write the estimate to the step summary and step outputs.
pub fn publish(
    estimate: &CostEstimate,
    message: &str,
    github: &GithubReport,
) -> Result<(), IngestError> {
    github.append_summary(&estimate.summary_markdown(message))?;
    github.set_outputs(&[
        ("directory_size_gb", format!("{:.6}", estimate.total_gb)),
        ("estimated_cost", format!("{:.6}", estimate.monthly_cost)),
    ])
}
