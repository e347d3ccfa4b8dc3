//! Per-symbol daily price/volume records and the rows derived from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One symbol's prices for one business date. Numeric fields are either all
/// present (a trading day) or all absent (holiday, pre-listing, or a fetch that
/// never succeeded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}

impl DailyRecord {
    /// Explicit "no data" record for a symbol/date.
    pub fn empty(symbol: &str, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.to_string(),
            date,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_none()
            && self.high.is_none()
            && self.low.is_none()
            && self.close.is_none()
            && self.volume.is_none()
    }

    /// (high + low) / 2, absent when either side is absent.
    pub fn average_price(&self) -> Option<f64> {
        match (self.high, self.low) {
            (Some(high), Some(low)) => Some((high + low) / 2.0),
            _ => None,
        }
    }
}

/// A record as read back from the sink, with the provenance stamp of the batch
/// that committed it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub record: DailyRecord,
    pub committed_at: DateTime<Utc>,
}

/// One reporting row: a stored record reduced to its average price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyAggregateRow {
    pub symbol: String,
    pub date: NaiveDate,
    pub avg_price: Option<f64>,
}

impl From<&DailyRecord> for WeeklyAggregateRow {
    fn from(record: &DailyRecord) -> Self {
        Self {
            symbol: record.symbol.clone(),
            date: record.date,
            avg_price: record.average_price(),
        }
    }
}
