//! Stock and FX processors: read a chunk file, run the retry sweep, summarize.

pub mod fx;
pub mod stock;

pub use fx::FxProcessor;
pub use stock::{load_delisted, StockProcessor};

use crate::error::IngestError;
use crate::executor::SweepReport;
use equicast_core::Identifier;
use std::path::PathBuf;

/// Outcome of a processor run, independent of the identifier type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub output_dir: PathBuf,
    /// Items swept after filtering.
    pub total: usize,
    pub succeeded: usize,
    /// `(identifier, last error)` for items that never succeeded, sorted.
    pub failed: Vec<(String, String)>,
    pub attempts: u32,
    pub error_log: Option<PathBuf>,
    /// Tickers dropped by the delisted filter (always 0 for FX).
    pub filtered: usize,
}

impl ProcessSummary {
    pub(crate) fn from_report<I: Identifier>(
        output_dir: PathBuf,
        report: &SweepReport<I>,
        filtered: usize,
    ) -> Self {
        Self {
            output_dir,
            total: report.results.len(),
            succeeded: report.succeeded(),
            failed: report
                .sorted_errors()
                .into_iter()
                .map(|(id, msg)| (id.to_string(), msg.to_string()))
                .collect(),
            attempts: report.attempts,
            error_log: report.error_log.clone(),
            filtered,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Treat any unresolved item as an error.
    pub fn ensure_complete(&self) -> Result<(), IngestError> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(IngestError::FetchFailure {
                failed: self.failed.len(),
                attempts: self.attempts,
            })
        }
    }
}
