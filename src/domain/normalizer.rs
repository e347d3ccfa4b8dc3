//! Extracts one day's record from a provider time-series payload.
//!
//! The payload maps `YYYY-MM-DD` keys to labelled fields (`1. open` .. `5. volume`).
//! A date missing from the series is an ordinary non-trading day and yields an
//! all-empty record. A present entry must parse completely or the payload is
//! rejected, so a record is never partially filled.

use crate::domain::daily_record::DailyRecord;
use crate::domain::error::FetchError;
use crate::domain::raw_snapshot::RawSnapshot;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};

pub const SERIES_KEY: &str = "Time Series (Daily)";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Field {
    Text(String),
    Number(f64),
}

#[derive(Debug, Deserialize)]
struct SeriesEntry {
    #[serde(rename = "1. open")]
    open: Field,
    #[serde(rename = "2. high")]
    high: Field,
    #[serde(rename = "3. low")]
    low: Field,
    #[serde(rename = "4. close")]
    close: Field,
    #[serde(rename = "5. volume")]
    volume: Field,
}

/// Parsed daily series, still keyed by the provider's date strings.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    entries: Map<String, Value>,
}

impl TimeSeries {
    pub fn record_for(&self, symbol: &str, date: NaiveDate) -> Result<DailyRecord, FetchError> {
        let key = date.format("%Y-%m-%d").to_string();
        let Some(raw) = self.entries.get(&key) else {
            return Ok(DailyRecord::empty(symbol, date));
        };

        let entry = SeriesEntry::deserialize(raw).map_err(|e| FetchError::MalformedPayload {
            reason: format!("entry {key}: {e}"),
        })?;

        Ok(DailyRecord {
            symbol: symbol.to_string(),
            date,
            open: Some(price(&entry.open, "open", &key)?),
            high: Some(price(&entry.high, "high", &key)?),
            low: Some(price(&entry.low, "low", &key)?),
            close: Some(price(&entry.close, "close", &key)?),
            volume: Some(volume(&entry.volume, &key)?),
        })
    }
}

fn malformed(field: &str, key: &str) -> FetchError {
    FetchError::MalformedPayload {
        reason: format!("entry {key}: unparseable {field}"),
    }
}

fn price(field: &Field, name: &str, key: &str) -> Result<f64, FetchError> {
    let value = match field {
        Field::Text(s) => s.trim().parse::<f64>().map_err(|_| malformed(name, key))?,
        Field::Number(n) => *n,
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(malformed(name, key))
    }
}

fn volume(field: &Field, key: &str) -> Result<i64, FetchError> {
    match field {
        Field::Text(s) => s.trim().parse::<i64>().map_err(|_| malformed("volume", key)),
        Field::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Ok(*n as i64),
        Field::Number(_) => Err(malformed("volume", key)),
    }
}

/// Parse a response body. Bodies without a series are classified by the
/// provider's own markers so throttling notices stand out in the logs.
pub fn parse_series(body: &[u8]) -> Result<TimeSeries, FetchError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| FetchError::MalformedPayload {
        reason: e.to_string(),
    })?;
    let Value::Object(mut root) = value else {
        return Err(FetchError::MalformedPayload {
            reason: "top-level value is not an object".into(),
        });
    };

    if let Some(series) = root.remove(SERIES_KEY) {
        return match series {
            Value::Object(entries) => Ok(TimeSeries { entries }),
            _ => Err(FetchError::MalformedPayload {
                reason: format!("{SERIES_KEY} is not an object"),
            }),
        };
    }

    if let Some(message) = root.get("Error Message").and_then(Value::as_str) {
        return Err(FetchError::Provider {
            message: message.to_string(),
        });
    }

    if let Some(notice) = root
        .get("Note")
        .or_else(|| root.get("Information"))
        .and_then(Value::as_str)
    {
        return Err(FetchError::Throttled {
            notice: notice.to_string(),
        });
    }

    Err(FetchError::MalformedPayload {
        reason: format!("missing {SERIES_KEY}"),
    })
}

/// Derive the record for `symbol` on `date` from a stored response.
pub fn normalize(
    snapshot: &RawSnapshot,
    symbol: &str,
    date: NaiveDate,
) -> Result<DailyRecord, FetchError> {
    parse_series(&snapshot.body)?.record_for(symbol, date)
}
