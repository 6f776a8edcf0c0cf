//! GitHub Actions step summary and step output files.
//!
//! Paths come from the caller (the binary reads `GITHUB_STEP_SUMMARY` and
//! `GITHUB_OUTPUT`). Both files are appended to; an unset path is a no-op.

use crate::error::IngestError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GithubReport {
    pub step_summary: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl GithubReport {
    pub fn new(step_summary: Option<PathBuf>, output: Option<PathBuf>) -> Self {
        Self {
            step_summary,
            output,
        }
    }

    /// Append Markdown to the step summary.
    pub fn append_summary(&self, markdown: &str) -> Result<(), IngestError> {
        match &self.step_summary {
            Some(path) => append(path, markdown),
            None => Ok(()),
        }
    }

    /// Append `name=value` lines to the step output file.
    pub fn set_outputs(&self, outputs: &[(&str, String)]) -> Result<(), IngestError> {
        let Some(path) = &self.output else {
            return Ok(());
        };
        let mut text = String::new();
        for (name, value) in outputs {
            text.push_str(&format!("{name}={value}\n"));
        }
        append(path, &text)
    }
}

fn append(path: &Path, text: &str) -> Result<(), IngestError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| IngestError::io(path, e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| IngestError::io(path, e))
}
