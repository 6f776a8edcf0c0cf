//! Stock adapter: several artifacts per ticker under `<out>/<TICKER>/`.

use super::{contain, FetchAdapter};
use crate::executor::FetchResult;
use equicast_core::extract::{StockExtractor, StockSignal};
use equicast_core::Ticker;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct StockAdapter {
    extractor: Arc<dyn StockExtractor>,
    output_dir: PathBuf,
    signals: Vec<StockSignal>,
}

impl StockAdapter {
    pub fn new(extractor: Arc<dyn StockExtractor>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            extractor,
            output_dir: output_dir.into(),
            signals: StockSignal::DEFAULT.to_vec(),
        }
    }

    /// Restrict the sub-fetches run per ticker.
    pub fn with_signals(mut self, signals: Vec<StockSignal>) -> Self {
        self.signals = signals;
        self
    }

    pub fn ticker_dir(&self, ticker: &Ticker) -> PathBuf {
        self.output_dir.join(ticker.as_str())
    }

    pub fn artifact_path(&self, ticker: &Ticker, signal: StockSignal) -> PathBuf {
        self.ticker_dir(ticker).join(signal.file_name())
    }

    fn fetch_signal(&self, ticker: &Ticker, signal: StockSignal, path: &Path) -> Result<(), String> {
        contain(|| {
            let table = signal.extract(self.extractor.as_ref(), ticker)?;
            table.write_parquet(path)?;
            info!(%ticker, %signal, rows = table.height(), "saved {}", path.display());
            Ok(())
        })
    }
}

impl FetchAdapter for StockAdapter {
    type Item = Ticker;

    /// Every sub-fetch is attempted even after an earlier one fails; existing
    /// artifacts are left alone.
    fn fetch(&self, ticker: &Ticker) -> FetchResult {
        if !ticker.is_path_safe() {
            return FetchResult::failure(format!(
                "invalid ticker symbol '{ticker}': not usable as a directory name"
            ));
        }
        let mut errors = Vec::new();

        for &signal in &self.signals {
            let path = self.artifact_path(ticker, signal);
            if path.exists() {
                debug!(%ticker, %signal, "artifact exists, skipping");
                continue;
            }
            if let Err(e) = self.fetch_signal(ticker, signal, &path) {
                errors.push(format!("{signal}: {e}"));
            }
        }

        if errors.is_empty() {
            FetchResult::success(self.ticker_dir(ticker))
        } else {
            FetchResult::failure(format!(
                "Failed to extract ticker data: {}.",
                errors.join("; ")
            ))
        }
    }

    fn cooldown(&self) -> Duration {
        self.extractor.cooldown()
    }
}
