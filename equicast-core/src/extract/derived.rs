//! Series derived locally from fetched FX prices.
//!
//! `calculations` adds returns, moving averages and rolling volatility to the
//! close series. `forecast` projects the close forward with a log-drift model
//! and a one-sigma band that widens with the horizon.

use super::table::{date_column, PriceBar};
use super::{ExtractError, Table};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use polars::prelude::*;

/// Rolling window for volatility.
pub const VOLATILITY_WINDOW: usize = 20;
/// Business days projected by `forecast`.
pub const FORECAST_HORIZON: usize = 30;

/// Rolling mean over `period` values. Positions before the window is full are NaN.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for end in period..=values.len() {
        let window = &values[end - period..end];
        out[end - 1] = window.iter().sum::<f64>() / period as f64;
    }
    out
}

/// Rolling sample standard deviation over `period` values.
pub fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period < 2 || values.len() < period {
        return out;
    }
    for end in period..=values.len() {
        out[end - 1] = sample_std(&values[end - period..end]);
    }
    out
}

fn sample_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

/// Simple and log returns; the first element of each is NaN.
pub fn returns(closes: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut simple = vec![f64::NAN; closes.len()];
    let mut log = vec![f64::NAN; closes.len()];
    for i in 1..closes.len() {
        let (prev, cur) = (closes[i - 1], closes[i]);
        simple[i] = cur / prev - 1.0;
        log[i] = (cur / prev).ln();
    }
    (simple, log)
}

/// `date, close, daily_return, log_return, sma_20, sma_50, volatility_20`.
pub fn calculations(bars: &[PriceBar], identifier: &str) -> Result<Table, ExtractError> {
    if bars.is_empty() {
        return Err(ExtractError::NoData {
            identifier: identifier.to_string(),
        });
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let (daily, log) = returns(&closes);
    let sma_20 = rolling_mean(&closes, 20);
    let sma_50 = rolling_mean(&closes, 50);
    let volatility = rolling_std(&daily, VOLATILITY_WINDOW);

    let frame = DataFrame::new(vec![
        date_column("date", bars.iter().map(|b| b.date))?,
        Column::new("close".into(), closes),
        Column::new("daily_return".into(), daily),
        Column::new("log_return".into(), log),
        Column::new("sma_20".into(), sma_20),
        Column::new("sma_50".into(), sma_50),
        Column::new("volatility_20".into(), volatility),
    ])
    .map_err(|e| ExtractError::Columnar(format!("dataframe creation: {e}")))?;
    Ok(Table::new(frame))
}

/// `date, forecast, lower, upper` for the next [`FORECAST_HORIZON`] business days.
pub fn forecast(bars: &[PriceBar], identifier: &str) -> Result<Table, ExtractError> {
    let closes: Vec<f64> = bars
        .iter()
        .map(|b| b.close)
        .filter(|c| c.is_finite() && *c > 0.0)
        .collect();
    let last_date = match bars.last() {
        Some(bar) if closes.len() >= 2 => bar.date,
        _ => {
            return Err(ExtractError::NoData {
                identifier: identifier.to_string(),
            })
        }
    };

    let (_, log) = returns(&closes);
    let log = &log[1..];
    let drift = log.iter().sum::<f64>() / log.len() as f64;
    let sigma = if log.len() >= 2 { sample_std(log) } else { 0.0 };
    let last_close = closes[closes.len() - 1];

    let dates = business_days_after(last_date, FORECAST_HORIZON);
    let mut point = Vec::with_capacity(FORECAST_HORIZON);
    let mut lower = Vec::with_capacity(FORECAST_HORIZON);
    let mut upper = Vec::with_capacity(FORECAST_HORIZON);
    for step in 1..=FORECAST_HORIZON {
        let h = step as f64;
        let center = last_close * (drift * h).exp();
        let spread = (sigma * h.sqrt()).exp();
        point.push(center);
        lower.push(center / spread);
        upper.push(center * spread);
    }

    let frame = DataFrame::new(vec![
        date_column("date", dates.into_iter())?,
        Column::new("forecast".into(), point),
        Column::new("lower".into(), lower),
        Column::new("upper".into(), upper),
    ])
    .map_err(|e| ExtractError::Columnar(format!("dataframe creation: {e}")))?;
    Ok(Table::new(frame))
}

/// The next `count` weekdays strictly after `from`.
pub fn business_days_after(from: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(count);
    let mut day = from;
    while days.len() < count {
        day += Duration::days(1);
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
    }
    days
}
