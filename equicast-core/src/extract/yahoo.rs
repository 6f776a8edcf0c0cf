//! Yahoo Finance extractor.
//!
//! Prices and dividends come from the v8 chart API; profiles and fundamentals
//! from the v10 quoteSummary API, flattened into `field, value` rows. FX pairs
//! use the `FROMTO=X` symbol convention. Derived FX signals (calculations,
//! forecast) are computed locally from the fetched price series.
//!
//! Each request retries transient failures a few times with exponential
//! delay. This is separate from the batch-level retry in the executor.

use super::circuit_breaker::CircuitBreaker;
use super::table::{Dividend, PriceBar};
use super::{derived, DateRange, ExtractError, FxExtractor, StockExtractor, Table};
use crate::identifier::{FxPair, Ticker};
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";
const PROFILE_MODULES: &str = "assetProfile,price,quoteType";
const FUNDAMENTAL_MODULES: &str = "summaryDetail,defaultKeyStatistics,financialData";
const FX_PROFILE_MODULES: &str = "price,quoteType";
const FX_FUNDAMENTAL_MODULES: &str = "summaryDetail";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
    events: Option<Events>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct Events {
    dividends: Option<HashMap<String, DividendEvent>>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    result: Option<Vec<Map<String, Value>>>,
    error: Option<ApiError>,
}

/// Production extractor backed by Yahoo Finance.
pub struct YahooExtractor {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooExtractor {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, ExtractError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ExtractError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Point at a different host (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn fx_symbol(pair: &FxPair) -> String {
        format!("{}=X", pair.compact())
    }

    fn chart_url(&self, symbol: &str, range: Option<DateRange>, events: bool) -> String {
        let window = match range {
            Some(r) => format!("period1={}&period2={}", r.start.timestamp(), r.end.timestamp()),
            None => "range=max".to_string(),
        };
        let events = if events { "&events=div" } else { "" };
        format!(
            "{}/v8/finance/chart/{symbol}?{window}&interval=1d&includeAdjustedClose=true{events}",
            self.base_url
        )
    }

    fn summary_url(&self, symbol: &str, modules: &str) -> String {
        format!(
            "{}/v10/finance/quoteSummary/{symbol}?modules={modules}",
            self.base_url
        )
    }

    fn chart(
        &self,
        symbol: &str,
        range: Option<DateRange>,
        events: bool,
    ) -> Result<ChartData, ExtractError> {
        let response: ChartResponse =
            self.get_json(&self.chart_url(symbol, range, events), symbol)?;
        parse_chart(symbol, response)
    }

    fn price_bars(
        &self,
        symbol: &str,
        range: Option<DateRange>,
    ) -> Result<Vec<PriceBar>, ExtractError> {
        let data = self.chart(symbol, range, false)?;
        parse_bars(symbol, data)
    }

    fn summary(&self, symbol: &str, modules: &str) -> Result<Table, ExtractError> {
        let response: QuoteSummaryResponse =
            self.get_json(&self.summary_url(symbol, modules), symbol)?;
        let fields = parse_summary(symbol, response)?;
        Table::from_fields(&fields)
    }

    /// GET `url` and decode JSON, with per-request retry and circuit breaker checks.
    fn get_json<T: DeserializeOwned>(&self, url: &str, symbol: &str) -> Result<T, ExtractError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }
            if !self.circuit_breaker.is_allowed() {
                return Err(ExtractError::CircuitOpen);
            }

            debug!(symbol, attempt, url, "requesting");
            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(ExtractError::Network(e.to_string()));
                    continue;
                }
                Err(e) => return Err(ExtractError::Network(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(ExtractError::CircuitOpen);
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after_secs = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(ExtractError::RateLimited { retry_after_secs });
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ExtractError::NoData {
                    identifier: symbol.to_string(),
                });
            }
            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(ExtractError::Response(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let body = resp.json::<T>().map_err(|e| {
                ExtractError::Response(format!("failed to parse response for {symbol}: {e}"))
            })?;
            self.circuit_breaker.record_success();
            return Ok(body);
        }

        Err(last_error.unwrap_or_else(|| ExtractError::Response("max retries exceeded".into())))
    }
}

impl StockExtractor for YahooExtractor {
    fn stock_prices(&self, ticker: &Ticker) -> Result<Table, ExtractError> {
        Table::from_bars(&self.price_bars(ticker.as_str(), None)?)
    }

    fn dividends(&self, ticker: &Ticker) -> Result<Table, ExtractError> {
        let data = self.chart(ticker.as_str(), None, true)?;
        Table::from_dividends(&parse_dividends(data))
    }

    fn company_profile(&self, ticker: &Ticker) -> Result<Table, ExtractError> {
        self.summary(ticker.as_str(), PROFILE_MODULES)
    }

    fn fundamentals(&self, ticker: &Ticker) -> Result<Table, ExtractError> {
        self.summary(ticker.as_str(), FUNDAMENTAL_MODULES)
    }

    fn cooldown(&self) -> Duration {
        self.circuit_breaker.remaining_cooldown()
    }
}

impl FxExtractor for YahooExtractor {
    fn fx_prices(&self, pair: &FxPair, range: Option<DateRange>) -> Result<Table, ExtractError> {
        Table::from_bars(&self.price_bars(&Self::fx_symbol(pair), range)?)
    }

    fn fx_profile(&self, pair: &FxPair) -> Result<Table, ExtractError> {
        self.summary(&Self::fx_symbol(pair), FX_PROFILE_MODULES)
    }

    fn fx_fundamentals(&self, pair: &FxPair) -> Result<Table, ExtractError> {
        self.summary(&Self::fx_symbol(pair), FX_FUNDAMENTAL_MODULES)
    }

    fn fx_calculations(
        &self,
        pair: &FxPair,
        range: Option<DateRange>,
    ) -> Result<Table, ExtractError> {
        let bars = self.price_bars(&Self::fx_symbol(pair), range)?;
        derived::calculations(&bars, &pair.to_string())
    }

    fn fx_forecast(&self, pair: &FxPair, range: Option<DateRange>) -> Result<Table, ExtractError> {
        let bars = self.price_bars(&Self::fx_symbol(pair), range)?;
        derived::forecast(&bars, &pair.to_string())
    }

    fn cooldown(&self) -> Duration {
        self.circuit_breaker.remaining_cooldown()
    }
}

fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<ChartData, ExtractError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => ExtractError::NoData {
            identifier: symbol.to_string(),
        },
        Some(err) => ExtractError::Response(format!("{}: {}", err.code, err.description)),
        None => ExtractError::Response("empty result with no error".into()),
    })?;

    result
        .into_iter()
        .next()
        .ok_or_else(|| ExtractError::Response("result array is empty".into()))
}

fn parse_bars(symbol: &str, data: ChartData) -> Result<Vec<PriceBar>, ExtractError> {
    let no_data = || ExtractError::NoData {
        identifier: symbol.to_string(),
    };
    let timestamps = data.timestamp.ok_or_else(no_data)?;
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ExtractError::Response("no quote data".into()))?;
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| ExtractError::Response(format!("invalid timestamp: {ts}")))?;

        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();

        // Holidays come back as all-null rows.
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
            continue;
        }

        let close = close.unwrap_or(f64::NAN);
        let adj_close = adj_closes
            .as_ref()
            .and_then(|v| v.get(i).copied().flatten())
            .unwrap_or(close);
        bars.push(PriceBar {
            date,
            open: open.unwrap_or(f64::NAN),
            high: high.unwrap_or(f64::NAN),
            low: low.unwrap_or(f64::NAN),
            close,
            volume: volume.unwrap_or(0),
            adj_close,
        });
    }

    if bars.is_empty() {
        return Err(no_data());
    }
    Ok(bars)
}

/// Dividends sorted by date. A ticker that never paid yields an empty list.
fn parse_dividends(data: ChartData) -> Vec<Dividend> {
    let mut dividends: Vec<Dividend> = data
        .events
        .and_then(|e| e.dividends)
        .unwrap_or_default()
        .into_values()
        .filter_map(|event| {
            DateTime::from_timestamp(event.date, 0).map(|dt| Dividend {
                date: dt.date_naive(),
                amount: event.amount,
            })
        })
        .collect();
    dividends.sort_by_key(|d| d.date);
    dividends
}

fn parse_summary(
    symbol: &str,
    resp: QuoteSummaryResponse,
) -> Result<Vec<(String, String)>, ExtractError> {
    let summary = resp.quote_summary;
    if let Some(err) = summary.error {
        if err.code == "Not Found" {
            return Err(ExtractError::NoData {
                identifier: symbol.to_string(),
            });
        }
        return Err(ExtractError::Response(format!(
            "{}: {}",
            err.code, err.description
        )));
    }

    let modules = summary
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ExtractError::NoData {
            identifier: symbol.to_string(),
        })?;

    let mut fields = Vec::new();
    for (module, value) in modules {
        flatten_value(&module, &value, &mut fields);
    }
    if fields.is_empty() {
        return Err(ExtractError::NoData {
            identifier: symbol.to_string(),
        });
    }
    Ok(fields)
}

/// Flatten nested JSON into dotted keys. `{raw, fmt}` number wrappers collapse
/// to their raw value; nulls and empty objects are dropped.
fn flatten_value(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            if let Some(raw) = map.get("raw") {
                flatten_value(prefix, raw, out);
                return;
            }
            for (key, child) in map {
                flatten_value(&format!("{prefix}.{key}"), child, out);
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                flatten_value(&format!("{prefix}.{idx}"), child, out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {
                    "quote": [{
                        "open":   [185.0, null, 182.0],
                        "high":   [186.0, null, 183.0],
                        "low":    [184.0, null, 181.0],
                        "close":  [185.5, null, 182.5],
                        "volume": [1000,  null, 1200]
                    }],
                    "adjclose": [{ "adjclose": [185.0, null, 182.0] }]
                },
                "events": {
                    "dividends": {
                        "1707490200": { "amount": 0.24, "date": 1707490200 },
                        "1699626600": { "amount": 0.24, "date": 1699626600 }
                    }
                }
            }],
            "error": null
        }
    }"#;

    fn chart() -> ChartData {
        let resp: ChartResponse = serde_json::from_str(CHART).unwrap();
        parse_chart("AAPL", resp).unwrap()
    }

    #[test]
    fn parses_bars_and_skips_null_rows() {
        let bars = parse_bars("AAPL", chart()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[1].close, 182.5);
        assert_eq!(bars[1].adj_close, 182.0);
    }

    #[test]
    fn parses_dividends_in_date_order() {
        let dividends = parse_dividends(chart());
        assert_eq!(dividends.len(), 2);
        assert!(dividends[0].date < dividends[1].date);
        assert_eq!(dividends[0].amount, 0.24);
    }

    #[test]
    fn chart_not_found_maps_to_no_data() {
        let resp: ChartResponse = serde_json::from_str(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            parse_chart("NOPE", resp),
            Err(ExtractError::NoData { .. })
        ));
    }

    #[test]
    fn summary_is_flattened_with_raw_values() {
        let resp: QuoteSummaryResponse = serde_json::from_str(
            r#"{"quoteSummary":{"result":[{
                "assetProfile": {"sector": "Technology", "fullTimeEmployees": 161000,
                                 "companyOfficers": [{"name": "Tim"}]},
                "price": {"regularMarketPrice": {"raw": 182.5, "fmt": "182.50"}, "maxAge": null}
            }],"error":null}}"#,
        )
        .unwrap();
        let fields = parse_summary("AAPL", resp).unwrap();
        let lookup = |k: &str| fields.iter().find(|(f, _)| f == k).map(|(_, v)| v.as_str());

        assert_eq!(lookup("assetProfile.sector"), Some("Technology"));
        assert_eq!(lookup("assetProfile.fullTimeEmployees"), Some("161000"));
        assert_eq!(lookup("assetProfile.companyOfficers.0.name"), Some("Tim"));
        assert_eq!(lookup("price.regularMarketPrice"), Some("182.5"));
        assert_eq!(lookup("price.maxAge"), None);
    }

    #[test]
    fn cooldown_follows_circuit_breaker() {
        let breaker = Arc::new(CircuitBreaker::new(Duration::from_secs(30), 5));
        let yahoo = YahooExtractor::new(breaker.clone()).unwrap();
        assert_eq!(StockExtractor::cooldown(&yahoo), Duration::ZERO);

        breaker.trip();
        let remaining = FxExtractor::cooldown(&yahoo);
        assert!(remaining > Duration::from_secs(25) && remaining <= Duration::from_secs(30));
    }

    #[test]
    fn fx_symbol_uses_yahoo_convention() {
        assert_eq!(YahooExtractor::fx_symbol(&FxPair::new("EUR", "USD")), "EURUSD=X");
    }
}
