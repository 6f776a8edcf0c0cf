//! Columnar artifacts backed by a Polars `DataFrame`.
//!
//! Writes are atomic: the frame goes to `<name>.parquet.tmp` first and is
//! renamed into place. A partially written artifact never carries the final
//! name.

use super::ExtractError;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One daily OHLCV bar as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

/// One dividend payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dividend {
    pub date: NaiveDate,
    pub amount: f64,
}

/// Tabular extractor output.
#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
}

impl Table {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Daily price table: `date, open, high, low, close, volume, adj_close`.
    pub fn from_bars(bars: &[PriceBar]) -> Result<Self, ExtractError> {
        let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();
        let adj_closes: Vec<f64> = bars.iter().map(|b| b.adj_close).collect();

        let frame = DataFrame::new(vec![
            date_column("date", bars.iter().map(|b| b.date))?,
            Column::new("open".into(), opens),
            Column::new("high".into(), highs),
            Column::new("low".into(), lows),
            Column::new("close".into(), closes),
            Column::new("volume".into(), volumes),
            Column::new("adj_close".into(), adj_closes),
        ])
        .map_err(|e| ExtractError::Columnar(format!("dataframe creation: {e}")))?;
        Ok(Self::new(frame))
    }

    /// Dividend table: `date, dividend`.
    pub fn from_dividends(dividends: &[Dividend]) -> Result<Self, ExtractError> {
        let amounts: Vec<f64> = dividends.iter().map(|d| d.amount).collect();

        let frame = DataFrame::new(vec![
            date_column("date", dividends.iter().map(|d| d.date))?,
            Column::new("dividend".into(), amounts),
        ])
        .map_err(|e| ExtractError::Columnar(format!("dataframe creation: {e}")))?;
        Ok(Self::new(frame))
    }

    /// Two-column `field, value` table for profile-style records.
    pub fn from_fields(fields: &[(String, String)]) -> Result<Self, ExtractError> {
        let names: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
        let values: Vec<&str> = fields.iter().map(|(_, v)| v.as_str()).collect();

        let frame = DataFrame::new(vec![
            Column::new("field".into(), names),
            Column::new("value".into(), values),
        ])
        .map_err(|e| ExtractError::Columnar(format!("dataframe creation: {e}")))?;
        Ok(Self::new(frame))
    }

    /// Write to `path` as Parquet, via a temporary file and rename.
    pub fn write_parquet(&self, path: &Path) -> Result<(), ExtractError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ExtractError::Columnar(format!("create dir: {e}")))?;
        }

        let tmp_path = path.with_extension("parquet.tmp");
        let file = fs::File::create(&tmp_path)
            .map_err(|e| ExtractError::Columnar(format!("create file: {e}")))?;
        ParquetWriter::new(file)
            .finish(&mut self.frame.clone())
            .map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                ExtractError::Columnar(format!("write parquet: {e}"))
            })?;

        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            ExtractError::Columnar(format!("atomic rename failed: {e}"))
        })
    }

    pub fn read_parquet(path: &Path) -> Result<Self, ExtractError> {
        let file =
            fs::File::open(path).map_err(|e| ExtractError::Columnar(format!("open: {e}")))?;
        let frame = ParquetReader::new(file)
            .finish()
            .map_err(|e| ExtractError::Columnar(format!("read: {e}")))?;
        Ok(Self::new(frame))
    }
}

/// Date column stored as days since the Unix epoch.
pub(crate) fn date_column(
    name: &str,
    dates: impl Iterator<Item = NaiveDate>,
) -> Result<Column, ExtractError> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let days: Vec<i32> = dates.map(|d| (d - epoch).num_days() as i32).collect();
    Column::new(name.into(), days)
        .cast(&DataType::Date)
        .map_err(|e| ExtractError::Columnar(format!("date cast: {e}")))
}
