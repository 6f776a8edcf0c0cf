//! Identifiers for fetchable entities: ticker symbols and currency pairs.
//!
//! Reference lists arrive as JSON arrays. Tickers are plain strings; currency
//! pairs may be either `"EUR/USD"` strings or `{ "from": "EUR", "to": "USD" }`
//! objects (extra fields such as `export` are ignored).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing identifiers or modes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("invalid mode '{0}': mode must be 'stock' or 'fx'")]
    InvalidMode(String),

    #[error("invalid currency pair '{0}': expected FROM/TO")]
    InvalidPair(String),
}

/// Anything the retry executor can schedule: hashable by value, printable for
/// logs, and shareable across worker threads.
pub trait Identifier: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static {}

impl<T> Identifier for T where T: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static {}

/// Which reference list a run operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Stock,
    Fx,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Stock => "stock",
            Mode::Fx => "fx",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock" => Ok(Mode::Stock),
            "fx" => Ok(Mode::Fx),
            other => Err(IdentifierError::InvalidMode(other.to_string())),
        }
    }
}

/// Exchange ticker symbol, e.g. `AAPL`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Usable as a single directory name: non-empty, no separators, not `.`/`..`.
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && !self.0.contains(['/', '\\'])
            && self.0 != "."
            && self.0 != ".."
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ticker {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Currency pair, displayed as `FROM/TO`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FxPair {
    pub from: String,
    pub to: String,
}

impl FxPair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Trimmed pair whose parts are non-empty and free of path separators.
    pub fn checked(from: &str, to: &str) -> Result<Self, IdentifierError> {
        let (from, to) = (from.trim(), to.trim());
        let valid = |part: &str| !part.is_empty() && !part.contains(['/', '\\']);
        if valid(from) && valid(to) {
            Ok(FxPair::new(from, to))
        } else {
            Err(IdentifierError::InvalidPair(format!("{from}/{to}")))
        }
    }

    /// `FROMTO` form used for artifact file names, e.g. `EURUSD`.
    pub fn compact(&self) -> String {
        format!("{}{}", self.from, self.to)
    }
}

impl fmt::Display for FxPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

impl FromStr for FxPair {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_once('/')
            .and_then(|(from, to)| FxPair::checked(from, to).ok())
            .ok_or_else(|| IdentifierError::InvalidPair(s.to_string()))
    }
}

#[derive(Serialize, Deserialize)]
struct PairObject {
    from: String,
    to: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PairRepr {
    Text(String),
    Object(PairObject),
}

impl Serialize for FxPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PairObject {
            from: self.from.clone(),
            to: self.to.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FxPair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match PairRepr::deserialize(deserializer)? {
            PairRepr::Text(text) => text.parse().map_err(serde::de::Error::custom),
            PairRepr::Object(obj) => {
                FxPair::checked(&obj.from, &obj.to).map_err(serde::de::Error::custom)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_known_values_only() {
        assert_eq!("stock".parse::<Mode>().unwrap(), Mode::Stock);
        assert_eq!("fx".parse::<Mode>().unwrap(), Mode::Fx);
        let err = "crypto".parse::<Mode>().unwrap_err();
        assert!(err.to_string().contains("mode must be 'stock' or 'fx'"));
    }

    #[test]
    fn pair_accepts_string_and_object_forms() {
        let pairs: Vec<FxPair> = serde_json::from_str(
            r#"["EUR/USD", {"from": "GBP", "to": "CHF", "export": false}]"#,
        )
        .unwrap();
        assert_eq!(pairs[0], FxPair::new("EUR", "USD"));
        assert_eq!(pairs[1], FxPair::new("GBP", "CHF"));
        assert_eq!(pairs[1].to_string(), "GBP/CHF");
        assert_eq!(pairs[1].compact(), "GBPCHF");
    }

    #[test]
    fn pair_rejects_malformed_text() {
        assert!("EURUSD".parse::<FxPair>().is_err());
        assert!("EUR/".parse::<FxPair>().is_err());
        assert!("A/B/C".parse::<FxPair>().is_err());
    }

    #[test]
    fn pair_object_form_is_validated_like_text() {
        for json in [
            r#"{"from": "A/B", "to": "C"}"#,
            r#"{"from": "EUR", "to": "..\\USD"}"#,
            r#"{"from": " ", "to": "USD"}"#,
        ] {
            assert!(serde_json::from_str::<FxPair>(json).is_err(), "{json}");
        }
        let pair: FxPair = serde_json::from_str(r#"{"from": " EUR ", "to": "USD"}"#).unwrap();
        assert_eq!(pair.compact(), "EURUSD");
        assert!("EUR/US\\D".parse::<FxPair>().is_err());
    }

    #[test]
    fn ticker_path_safety() {
        assert!(Ticker::new("BRK-B").is_path_safe());
        assert!(Ticker::new("^GSPC").is_path_safe());
        for bad in ["", ".", "..", "../etc", "/abs", "A\\B"] {
            assert!(!Ticker::new(bad).is_path_safe(), "{bad}");
        }
    }

    #[test]
    fn pair_equality_ignores_input_shape() {
        let a: FxPair = serde_json::from_str(r#""USD/GBP""#).unwrap();
        let b: FxPair = serde_json::from_str(r#"{"from":"USD","to":"GBP"}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ticker_is_transparent_in_json() {
        let tickers: Vec<Ticker> = serde_json::from_str(r#"["AAPL","MSFT"]"#).unwrap();
        assert_eq!(tickers[1].as_str(), "MSFT");
        assert_eq!(serde_json::to_string(&tickers).unwrap(), r#"["AAPL","MSFT"]"#);
    }
}
