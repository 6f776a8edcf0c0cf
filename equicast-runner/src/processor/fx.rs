//! FX processor: one signal per run across every pair in a chunk file.

use super::ProcessSummary;
use crate::adapter::FxAdapter;
use crate::error::{from_split, IngestError};
use crate::executor::{RetryExecutor, RetryPolicy};
use crate::progress::SweepProgress;
use chrono::{DateTime, Utc};
use equicast_core::extract::{DateRange, FxExtractor, FxSignal};
use equicast_core::splitter::read_json_list;
use equicast_core::FxPair;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct FxProcessor {
    extractor: Arc<dyn FxExtractor>,
    policy: RetryPolicy,
    output_root: PathBuf,
    full_run: bool,
    now: DateTime<Utc>,
    progress: Option<Box<dyn SweepProgress>>,
}

impl FxProcessor {
    pub fn new(
        extractor: Arc<dyn FxExtractor>,
        policy: RetryPolicy,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            extractor,
            policy,
            output_root: output_root.into(),
            full_run: false,
            now: Utc::now(),
            progress: None,
        }
    }

    /// Fetch the full history instead of year-to-date.
    pub fn full_run(mut self, full_run: bool) -> Self {
        self.full_run = full_run;
        self
    }

    /// Pin the clock used for the year-to-date window.
    pub fn as_of(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn SweepProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// `<root>/fx_<signal>/`.
    pub fn output_dir(&self, signal: FxSignal) -> PathBuf {
        self.output_root.join(signal.dir_name())
    }

    pub fn date_range(&self) -> Option<DateRange> {
        if self.full_run {
            None
        } else {
            Some(DateRange::year_to_date(self.now))
        }
    }

    pub fn run(self, signal: FxSignal, pair_file: &Path) -> Result<ProcessSummary, IngestError> {
        let pairs: Vec<FxPair> = read_json_list(pair_file).map_err(from_split)?;
        let output_dir = self.output_dir(signal);
        fs::create_dir_all(&output_dir).map_err(|e| IngestError::io(&output_dir, e))?;

        let range = self.date_range();
        match range {
            Some(r) => info!(%signal, start = %r.start, end = %r.end, pairs = pairs.len(), "fetching fx data"),
            None => info!(%signal, pairs = pairs.len(), "fetching full fx history"),
        }

        let adapter = FxAdapter::new(self.extractor.clone(), signal, &output_dir, range);
        let mut executor =
            RetryExecutor::new(self.policy, output_dir.join(signal.error_log_name()));
        if let Some(progress) = self.progress {
            executor = executor.with_progress(progress);
        }

        let report = executor.run(pairs, &adapter)?;
        Ok(ProcessSummary::from_report(output_dir, &report, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Backoff, MinWorkers};
    use chrono::TimeZone;
    use equicast_core::extract::{ExtractError, Table};

    struct NoopFx;

    impl FxExtractor for NoopFx {
        fn fx_prices(&self, _: &FxPair, _: Option<DateRange>) -> Result<Table, ExtractError> {
            Err(ExtractError::CircuitOpen)
        }
        fn fx_profile(&self, _: &FxPair) -> Result<Table, ExtractError> {
            Err(ExtractError::CircuitOpen)
        }
        fn fx_fundamentals(&self, _: &FxPair) -> Result<Table, ExtractError> {
            Err(ExtractError::CircuitOpen)
        }
        fn fx_calculations(&self, _: &FxPair, _: Option<DateRange>) -> Result<Table, ExtractError> {
            Err(ExtractError::CircuitOpen)
        }
        fn fx_forecast(&self, _: &FxPair, _: Option<DateRange>) -> Result<Table, ExtractError> {
            Err(ExtractError::CircuitOpen)
        }
    }

    fn processor() -> FxProcessor {
        let policy = RetryPolicy {
            max_attempts: 1,
            max_workers: 1,
            min_workers: MinWorkers::Proportional,
            decay_rate: 0.2,
            backoff: Backoff::none(),
        };
        FxProcessor::new(Arc::new(NoopFx), policy, "fx_downloads")
    }

    #[test]
    fn default_window_is_year_to_date() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let range = processor().as_of(now).date_range().unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(range.end, now);
    }

    #[test]
    fn full_run_removes_window() {
        assert!(processor().full_run(true).date_range().is_none());
    }

    #[test]
    fn output_dir_is_per_signal() {
        assert_eq!(
            processor().output_dir(FxSignal::Forecast),
            PathBuf::from("fx_downloads").join("fx_forecast")
        );
    }

    #[test]
    fn missing_pair_file_is_mandatory_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FxProcessor::new(Arc::new(NoopFx), processor().policy, dir.path())
            .run(FxSignal::Prices, &dir.path().join("chunk_9.json"))
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingMandatoryInput { .. }));
    }
}
