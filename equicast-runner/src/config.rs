//! Ingestion configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! production settings. CLI flags are applied on top by the binary.

use crate::executor::{Backoff, MinWorkers, RetryPolicy};
use equicast_core::splitter::DEFAULT_MAX_CHUNKS;
use equicast_core::storage::S3Settings;
use equicast_core::Mode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub storage: StorageConfig,
    pub inputs: InputsConfig,
    pub stock: StockConfig,
    pub fx: FxConfig,
    pub backoff: BackoffConfig,
    pub splitter: SplitterConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub region: String,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub stock_bucket: String,
    pub fx_bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region: "eu-west-1".into(),
            endpoint: None,
            force_path_style: false,
            stock_bucket: "equicast-tickers".into(),
            fx_bucket: "equicast-fxpairs".into(),
        }
    }
}

/// Reference files fetched by the downloader, per mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputsConfig {
    pub stock_mandatory: Vec<String>,
    pub stock_optional: Vec<String>,
    pub fx_mandatory: Vec<String>,
    pub fx_optional: Vec<String>,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            stock_mandatory: vec!["tickers.json".into()],
            stock_optional: vec!["ticker_status.json".into()],
            fx_mandatory: vec!["fxpairs.json".into()],
            fx_optional: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockConfig {
    pub max_workers: usize,
    pub max_attempts: u32,
    pub min_workers: usize,
    pub decay_rate: f64,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            max_workers: 80,
            max_attempts: 5,
            min_workers: 10,
            decay_rate: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxConfig {
    pub max_workers: usize,
    pub max_attempts: u32,
    /// Fixed floor; unset means `max_workers / max_attempts`.
    pub min_workers: Option<usize>,
    pub decay_rate: f64,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            max_workers: 20,
            max_attempts: 5,
            min_workers: None,
            decay_rate: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_secs: 5.0,
            max_secs: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    pub max_chunks: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Object name used for each pair in `fx` upload mode.
    pub fx_artifact_name: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            fx_artifact_name: "fx_history.parquet".into(),
        }
    }
}

impl IngestConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sweeps = [
            ("stock", self.stock.max_workers, self.stock.max_attempts, self.stock.decay_rate),
            ("fx", self.fx.max_workers, self.fx.max_attempts, self.fx.decay_rate),
        ];
        for (name, workers, attempts, decay) in sweeps {
            if workers == 0 {
                return Err(ConfigError::Invalid(format!("{name}.max_workers must be > 0")));
            }
            if attempts == 0 {
                return Err(ConfigError::Invalid(format!("{name}.max_attempts must be > 0")));
            }
            if !(0.0..1.0).contains(&decay) {
                return Err(ConfigError::Invalid(format!(
                    "{name}.decay_rate must be in [0, 1), got {decay}"
                )));
            }
        }
        let (min, max) = (self.backoff.min_secs, self.backoff.max_secs);
        if Duration::try_from_secs_f64(min).is_err()
            || Duration::try_from_secs_f64(max).is_err()
            || max < min
        {
            return Err(ConfigError::Invalid(format!(
                "backoff requires finite 0 <= min_secs <= max_secs, got {min} and {max}"
            )));
        }
        if self.splitter.max_chunks == 0 {
            return Err(ConfigError::Invalid("splitter.max_chunks must be > 0".into()));
        }
        Ok(())
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            min: Duration::from_secs_f64(self.backoff.min_secs),
            max: Duration::from_secs_f64(self.backoff.max_secs),
        }
    }

    pub fn stock_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.stock.max_attempts,
            max_workers: self.stock.max_workers,
            min_workers: MinWorkers::Fixed(self.stock.min_workers),
            decay_rate: self.stock.decay_rate,
            backoff: self.backoff(),
        }
    }

    pub fn fx_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.fx.max_attempts,
            max_workers: self.fx.max_workers,
            min_workers: self
                .fx
                .min_workers
                .map_or(MinWorkers::Proportional, MinWorkers::Fixed),
            decay_rate: self.fx.decay_rate,
            backoff: self.backoff(),
        }
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            region: self.storage.region.clone(),
            endpoint: self.storage.endpoint.clone(),
            force_path_style: self.storage.force_path_style,
        }
    }

    pub fn bucket(&self, mode: Mode) -> &str {
        match mode {
            Mode::Stock => &self.storage.stock_bucket,
            Mode::Fx => &self.storage.fx_bucket,
        }
    }

    /// `(mandatory, optional)` reference files for `mode`.
    pub fn inputs(&self, mode: Mode) -> (&[String], &[String]) {
        match mode {
            Mode::Stock => (&self.inputs.stock_mandatory, &self.inputs.stock_optional),
            Mode::Fx => (&self.inputs.fx_mandatory, &self.inputs.fx_optional),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = IngestConfig::from_toml("").unwrap();
        assert_eq!(config, IngestConfig::default());
        assert_eq!(config.bucket(Mode::Stock), "equicast-tickers");
        assert_eq!(config.s3_settings().region, "eu-west-1");
        assert_eq!(config.stock_policy().min_workers(), 10);
        assert_eq!(config.fx_policy().min_workers(), 4);
    }

    #[test]
    fn partial_sections_override_defaults() {
        let config = IngestConfig::from_toml(
            r#"
            [fx]
            max_workers = 8

            [backoff]
            min_secs = 0.0
            max_secs = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.fx.max_workers, 8);
        assert_eq!(config.fx.max_attempts, 5);
        assert_eq!(config.backoff().max, Duration::from_millis(500));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            IngestConfig::from_toml("[stock]\nmax_workers = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            IngestConfig::from_toml("[fx]\ndecay_rate = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            IngestConfig::from_toml("[backoff]\nmin_secs = 3.0\nmax_secs = 1.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            IngestConfig::from_toml("[stock\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_non_finite_backoff() {
        for text in [
            "[backoff]\nmax_secs = inf",
            "[backoff]\nmin_secs = nan",
            "[backoff]\nmin_secs = -inf",
            "[backoff]\nmax_secs = 1e300",
        ] {
            assert!(
                matches!(IngestConfig::from_toml(text), Err(ConfigError::Invalid(_))),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn toml_roundtrip() {
        let config = IngestConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(IngestConfig::from_toml(&text).unwrap(), config);
    }
}
