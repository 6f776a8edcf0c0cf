//! Equicast Runner: retrying fetch sweeps, processors, transfer commands.
//!
//! This crate builds on `equicast-core` to provide:
//! - The decaying-concurrency retry executor and its per-identifier adapters
//! - Stock and FX processors (chunk file in, Parquet artifacts and error log out)
//! - Reference-list download, artifact upload and storage cost estimates
//! - TOML configuration and GitHub Actions step reporting

pub mod adapter;
pub mod config;
pub mod cost;
pub mod downloader;
pub mod error;
pub mod executor;
pub mod files;
pub mod processor;
pub mod progress;
pub mod summary;
pub mod uploader;

pub use adapter::{FetchAdapter, FxAdapter, StockAdapter};
pub use config::{ConfigError, IngestConfig};
pub use cost::{estimate, publish, CostEstimate};
pub use downloader::{DownloadReport, Downloader};
pub use error::IngestError;
pub use executor::{Backoff, FetchResult, MinWorkers, RetryExecutor, RetryPolicy, SweepReport};
pub use processor::{FxProcessor, ProcessSummary, StockProcessor};
pub use progress::{BarProgress, SilentProgress, SweepProgress};
pub use summary::GithubReport;
pub use uploader::{UploadMode, UploadReport, UploadRequest, Uploader};

use equicast_core::Mode;

/// Parse a `stock`/`fx` mode argument.
pub fn parse_mode(value: &str) -> Result<Mode, IngestError> {
    value
        .parse::<Mode>()
        .map_err(|e| IngestError::InvalidArgument(e.to_string()))
}

#[cfg(test)]
mod send_sync_checks {
    use super::*;
    use equicast_core::{FxPair, Ticker};

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn adapters_are_send_sync() {
        assert_send::<StockAdapter>();
        assert_sync::<StockAdapter>();
        assert_send::<FxAdapter>();
        assert_sync::<FxAdapter>();
    }

    #[test]
    fn executor_types_are_send_sync() {
        assert_send::<RetryPolicy>();
        assert_sync::<RetryPolicy>();
        assert_send::<FetchResult>();
        assert_sync::<FetchResult>();
        assert_send::<SweepReport<Ticker>>();
        assert_send::<SweepReport<FxPair>>();
        assert_send::<RetryExecutor>();
    }

    #[test]
    fn progress_sinks_are_send_sync() {
        assert_send::<BarProgress>();
        assert_sync::<BarProgress>();
        assert_send::<SilentProgress>();
        assert_sync::<SilentProgress>();
    }

    #[test]
    fn config_is_send_sync() {
        assert_send::<IngestConfig>();
        assert_sync::<IngestConfig>();
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(parse_mode("stock").unwrap(), Mode::Stock);
        assert_eq!(parse_mode("fx").unwrap(), Mode::Fx);
        assert!(matches!(
            parse_mode("bonds"),
            Err(IngestError::InvalidArgument(_))
        ));
    }
}
