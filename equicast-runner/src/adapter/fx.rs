//! FX adapter: one artifact per pair for a single signal, `<out>/<FROMTO>.parquet`.

use super::{contain, FetchAdapter};
use crate::executor::FetchResult;
use equicast_core::extract::{DateRange, FxExtractor, FxSignal};
use equicast_core::FxPair;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct FxAdapter {
    extractor: Arc<dyn FxExtractor>,
    signal: FxSignal,
    output_dir: PathBuf,
    /// `None` fetches the full history.
    range: Option<DateRange>,
}

impl FxAdapter {
    pub fn new(
        extractor: Arc<dyn FxExtractor>,
        signal: FxSignal,
        output_dir: impl Into<PathBuf>,
        range: Option<DateRange>,
    ) -> Self {
        Self {
            extractor,
            signal,
            output_dir: output_dir.into(),
            range,
        }
    }

    pub fn artifact_path(&self, pair: &FxPair) -> PathBuf {
        self.output_dir.join(format!("{}.parquet", pair.compact()))
    }
}

impl FetchAdapter for FxAdapter {
    type Item = FxPair;

    fn fetch(&self, pair: &FxPair) -> FetchResult {
        let path = self.artifact_path(pair);
        let outcome = contain(|| {
            let table = self
                .signal
                .extract(self.extractor.as_ref(), pair, self.range)?;
            table.write_parquet(&path)?;
            info!(%pair, signal = %self.signal, rows = table.height(), "saved {}", path.display());
            Ok(())
        });

        match outcome {
            Ok(()) => FetchResult::success(path),
            Err(error) => FetchResult::failure(error),
        }
    }

    fn cooldown(&self) -> Duration {
        self.extractor.cooldown()
    }
}
