//! Stock processor: delisted filter, then a retry sweep over tickers.

use super::ProcessSummary;
use crate::adapter::StockAdapter;
use crate::error::{from_split, IngestError};
use crate::executor::{RetryExecutor, RetryPolicy};
use crate::progress::SweepProgress;
use equicast_core::extract::{StockExtractor, StockSignal};
use equicast_core::splitter::read_json_list;
use equicast_core::Ticker;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const ERROR_LOG_NAME: &str = "error.log";

pub struct StockProcessor {
    extractor: Arc<dyn StockExtractor>,
    policy: RetryPolicy,
    output_dir: PathBuf,
    signals: Vec<StockSignal>,
    progress: Option<Box<dyn SweepProgress>>,
}

impl StockProcessor {
    pub fn new(
        extractor: Arc<dyn StockExtractor>,
        policy: RetryPolicy,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            extractor,
            policy,
            output_dir: output_dir.into(),
            signals: StockSignal::DEFAULT.to_vec(),
            progress: None,
        }
    }

    pub fn with_signals(mut self, signals: Vec<StockSignal>) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn SweepProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.output_dir.join(ERROR_LOG_NAME)
    }

    /// Process every ticker in `ticker_file`. When `status_file` exists,
    /// tickers it flags as delisted are skipped.
    pub fn run(
        self,
        ticker_file: &Path,
        status_file: Option<&Path>,
    ) -> Result<ProcessSummary, IngestError> {
        if self.signals.is_empty() {
            return Err(IngestError::InvalidArgument(
                "at least one stock signal is required".into(),
            ));
        }
        let tickers: Vec<Ticker> = read_json_list(ticker_file).map_err(from_split)?;
        fs::create_dir_all(&self.output_dir).map_err(|e| IngestError::io(&self.output_dir, e))?;

        let delisted = match status_file {
            Some(path) if path.exists() => load_delisted(path),
            Some(path) => {
                let missing = IngestError::MissingOptionalInput {
                    resource: path.display().to_string(),
                };
                warn!("{missing}; processing all tickers");
                HashSet::new()
            }
            None => HashSet::new(),
        };

        let before = tickers.len();
        let tickers: Vec<Ticker> = tickers
            .into_iter()
            .filter(|t| !delisted.contains(t))
            .collect();
        let filtered = before - tickers.len();
        if filtered > 0 {
            info!(filtered, "removed delisted tickers");
        }

        let adapter = StockAdapter::new(self.extractor.clone(), &self.output_dir)
            .with_signals(self.signals.clone());
        let mut executor = RetryExecutor::new(self.policy, self.error_log_path());
        if let Some(progress) = self.progress {
            executor = executor.with_progress(progress);
        }

        let report = executor.run(tickers, &adapter)?;
        Ok(ProcessSummary::from_report(
            self.output_dir,
            &report,
            filtered,
        ))
    }
}

/// Tickers flagged `is_delisted` in a status file.
///
/// Accepts an array of `{"ticker": .., "is_delisted": ..}` records (`symbol`
/// also works as the key) or an object keyed by ticker whose values are either
/// booleans or such records. Anything unrecognised is skipped with a warning;
/// an unreadable file disables the filter.
pub fn load_delisted(path: &Path) -> HashSet<Ticker> {
    let parsed = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()));
    let value = match parsed {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable ticker status file");
            return HashSet::new();
        }
    };

    let mut delisted = HashSet::new();
    match value {
        Value::Array(entries) => {
            for entry in entries {
                let symbol = entry
                    .get("ticker")
                    .or_else(|| entry.get("symbol"))
                    .and_then(Value::as_str);
                match (symbol, entry.get("is_delisted").and_then(Value::as_bool)) {
                    (Some(symbol), Some(true)) => {
                        delisted.insert(Ticker::new(symbol));
                    }
                    (Some(_), Some(false)) => {}
                    _ => warn!(%entry, "skipping malformed ticker status entry"),
                }
            }
        }
        Value::Object(map) => {
            for (symbol, status) in map {
                let flag = status
                    .as_bool()
                    .or_else(|| status.get("is_delisted").and_then(Value::as_bool));
                match flag {
                    Some(true) => {
                        delisted.insert(Ticker::new(symbol));
                    }
                    Some(false) => {}
                    None => warn!(%symbol, "skipping malformed ticker status entry"),
                }
            }
        }
        _ => warn!(path = %path.display(), "ticker status file is neither an array nor an object"),
    }
    delisted
}
