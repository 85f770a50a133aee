//! Price history ingestion
//!
//! Converts the JSON returned by a historical-data provider into [`Candle`]s
//! that the detectors can consume. This is the one place where loosely typed
//! input becomes `f64`: prices may arrive as JSON numbers or as numeric
//! strings, and anything that does not parse to a finite number is rejected
//! here rather than leaking into pattern arithmetic.
//!
//! Accepted shapes:
//!
//! ```json
//! {"data": [{"timestamp": "2024-01-01T00:00:00", "open": 42000.5, "high": "42750",
//!            "low": 41800, "close": 42600.1, "volume": 1234.5}]}
//! ```
//!
//! or the bare array of records. A response without `data` (or with
//! `"data": null`) is an empty history; one carrying an `error` message is
//! rejected.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{PatternError, Result, OHLCV};

/// Timeframe requested when none is given
pub const DEFAULT_TIMEFRAME: &str = "1d";
/// Number of bars requested when none is given
pub const DEFAULT_LIMIT: usize = 30;

// ============================================================
// REQUEST
// ============================================================

/// Request body for a historical-data provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub symbol: String,
    pub timeframe: String,
    pub limit: usize,
}

impl HistoryRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: DEFAULT_TIMEFRAME.to_string(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn timeframe(mut self, timeframe: impl Into<String>) -> Self {
        self.timeframe = timeframe.into();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| PatternError::InvalidConfig(e.to_string()))
    }
}

// ============================================================
// CANDLE
// ============================================================

/// A strictly typed OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp: None,
            open,
            high,
            low,
            close,
            volume: 0.0,
        }
    }
}

impl OHLCV for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

// ============================================================
// RAW WIRE SHAPES
// ============================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Millis(i64),
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    timestamp: Option<RawTimestamp>,
    open: RawNumber,
    high: RawNumber,
    low: RawNumber,
    close: RawNumber,
    #[serde(default)]
    volume: Option<RawNumber>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawHistory {
    Bare(Vec<RawRecord>),
    Envelope {
        #[serde(default)]
        data: Option<Vec<RawRecord>>,
        #[serde(default)]
        error: Option<String>,
    },
}

impl RawNumber {
    fn to_f64(&self, index: usize, field: &'static str) -> Result<f64> {
        let value = match self {
            RawNumber::Number(v) => *v,
            RawNumber::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                warn!("record {index}: {field} is not a number: {s:?}");
                PatternError::MalformedHistory(format!(
                    "record {index}: {field} is not a number: {s:?}"
                ))
            })?,
        };

        if !value.is_finite() {
            warn!("record {index}: non-finite {field}");
            return Err(PatternError::InvalidOHLCV {
                index,
                reason: "non-finite value",
            });
        }
        Ok(value)
    }
}

impl RawRecord {
    fn into_candle(self, index: usize) -> Result<Candle> {
        let volume = match self.volume {
            Some(ref v) => v.to_f64(index, "volume")?,
            None => 0.0,
        };

        Ok(Candle {
            timestamp: self.timestamp.map(|ts| match ts {
                RawTimestamp::Text(s) => s,
                RawTimestamp::Millis(ms) => ms.to_string(),
            }),
            open: self.open.to_f64(index, "open")?,
            high: self.high.to_f64(index, "high")?,
            low: self.low.to_f64(index, "low")?,
            close: self.close.to_f64(index, "close")?,
            volume,
        })
    }
}

// ============================================================
// PARSING
// ============================================================

/// Parse a price-history response into candles, oldest first as received.
///
/// OHLC ordering is not checked here; enable engine data validation for that.
pub fn parse_history(json: &str) -> Result<Vec<Candle>> {
    let raw: RawHistory =
        serde_json::from_str(json).map_err(|e| PatternError::MalformedHistory(e.to_string()))?;

    let records = match raw {
        RawHistory::Bare(records) => records,
        RawHistory::Envelope {
            error: Some(message),
            ..
        } => {
            warn!("price history provider reported an error: {message}");
            return Err(PatternError::MalformedHistory(message));
        }
        RawHistory::Envelope { data, .. } => data.unwrap_or_default(),
    };

    let candles = records
        .into_iter()
        .enumerate()
        .map(|(index, record)| record.into_candle(index))
        .collect::<Result<Vec<_>>>()?;

    debug!("parsed {} bars of price history", candles.len());
    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req = HistoryRequest::new("BTC/USDT");
        assert_eq!(req.timeframe, "1d");
        assert_eq!(req.limit, 30);
        assert_eq!(
            req.to_json().unwrap(),
            r#"{"symbol":"BTC/USDT","timeframe":"1d","limit":30}"#
        );
    }

    #[test]
    fn test_request_overrides() {
        let req = HistoryRequest::new("ETH/USDT").timeframe("4h").limit(100);
        assert_eq!(req.timeframe, "4h");
        assert_eq!(req.limit, 100);
    }

    #[test]
    fn test_parse_numbers_and_strings() {
        let json = r#"{"data": [
            {"timestamp": "2024-01-01T00:00:00", "open": 100, "high": "105.5", "low": 95.25, "close": " 101 ", "volume": 10}
        ]}"#;
        let candles = parse_history(json).unwrap();
        assert_eq!(candles.len(), 1);
        let c = &candles[0];
        assert_eq!(c.timestamp.as_deref(), Some("2024-01-01T00:00:00"));
        assert_eq!(c.open, 100.0);
        assert_eq!(c.high, 105.5);
        assert_eq!(c.low, 95.25);
        assert_eq!(c.close, 101.0);
        assert_eq!(c.volume, 10.0);
    }

    #[test]
    fn test_parse_bare_array_without_optional_fields() {
        let json = r#"[{"open": 1, "high": 2, "low": 0.5, "close": 1.5, "timestamp": 1700000000000}]"#;
        let candles = parse_history(json).unwrap();
        assert_eq!(candles[0].volume, 0.0);
        assert_eq!(candles[0].timestamp.as_deref(), Some("1700000000000"));
    }

    #[test]
    fn test_missing_or_null_data_is_empty() {
        assert!(parse_history("{}").unwrap().is_empty());
        assert!(parse_history(r#"{"data": null}"#).unwrap().is_empty());
        assert!(parse_history("[]").unwrap().is_empty());
    }

    #[test]
    fn test_provider_error_is_rejected() {
        let err = parse_history(r#"{"error": "Could not fetch historical data"}"#).unwrap_err();
        assert!(matches!(err, PatternError::MalformedHistory(ref m) if m.contains("Could not fetch")));
    }

    #[test]
    fn test_rejects_non_numeric_string() {
        let json = r#"{"data": [{"open": "abc", "high": 2, "low": 0.5, "close": 1.5}]}"#;
        assert!(matches!(
            parse_history(json),
            Err(PatternError::MalformedHistory(_))
        ));
    }

    #[test]
    fn test_rejects_non_finite_string() {
        let json = r#"{"data": [
            {"open": 1, "high": 2, "low": 0.5, "close": 1.5},
            {"open": 1, "high": "inf", "low": 0.5, "close": 1.5}
        ]}"#;
        match parse_history(json) {
            Err(PatternError::InvalidOHLCV { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InvalidOHLCV, got {other:?}"),
        }

        let json = r#"[{"open": "NaN", "high": 2, "low": 0.5, "close": 1.5}]"#;
        assert!(matches!(
            parse_history(json),
            Err(PatternError::InvalidOHLCV { index: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_missing_price() {
        let json = r#"{"data": [{"open": 1, "high": 2, "low": 0.5}]}"#;
        assert!(parse_history(json).is_err());
    }

    #[test]
    fn test_rejects_invalid_json() {
        assert!(matches!(
            parse_history("not json"),
            Err(PatternError::MalformedHistory(_))
        ));
    }
}
