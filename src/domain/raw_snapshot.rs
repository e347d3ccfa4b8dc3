//! Unprocessed provider responses kept for audit and replay.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSnapshot {
    pub symbol: String,
    pub date: NaiveDate,
    pub body: Vec<u8>,
}

impl RawSnapshot {
    pub fn new(symbol: &str, date: NaiveDate, body: Vec<u8>) -> Self {
        Self {
            symbol: symbol.to_string(),
            date,
            body,
        }
    }

    /// Storage key, `{YYYYMMDD}_{SYMBOL}.json`.
    pub fn key(&self) -> String {
        snapshot_key(&self.symbol, self.date)
    }
}

pub fn snapshot_key(symbol: &str, date: NaiveDate) -> String {
    format!("{}_{}.json", date.format("%Y%m%d"), symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_uses_compact_date_and_symbol() {
        let snapshot = RawSnapshot::new("AMZN", NaiveDate::from_ymd_opt(2023, 6, 5).unwrap(), vec![]);
        assert_eq!(snapshot.key(), "20230605_AMZN.json");
    }
}
