//! Weekly aggregate report.
//!
//! Every stored copy of a (symbol, date) contributes its own row, so a window
//! loaded twice in append mode shows up twice. `distinct` collapses rows that
//! are identical in (symbol, date, avg_price).

use crate::domain::daily_record::{StoredRecord, WeeklyAggregateRow};
use crate::domain::error::PipelineError;
use crate::domain::run_window::report_range;
use crate::ports::report_port::ReportPort;
use crate::ports::sink_port::SinkPort;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReport {
    pub week_start: NaiveDate,
    pub rows: Vec<WeeklyAggregateRow>,
    pub artifact: PathBuf,
}

pub struct Reporter<'a> {
    sink: &'a dyn SinkPort,
    renderer: &'a dyn ReportPort,
    distinct: bool,
}

impl<'a> Reporter<'a> {
    pub fn new(sink: &'a dyn SinkPort, renderer: &'a dyn ReportPort, distinct: bool) -> Self {
        Self {
            sink,
            renderer,
            distinct,
        }
    }

    /// Aggregate and render the Monday-Friday week containing `date`.
    pub fn report(&self, date: NaiveDate) -> Result<WeeklyReport, PipelineError> {
        let (week_start, week_end) = report_range(date);
        let stored = self.sink.query_range(week_start, week_end)?;
        let rows = aggregate(&stored, self.distinct);
        let artifact = self.renderer.render(week_start, &rows)?;
        info!(
            week_start = %week_start,
            rows = rows.len(),
            artifact = %artifact.display(),
            "weekly report rendered"
        );
        Ok(WeeklyReport {
            week_start,
            rows,
            artifact,
        })
    }
}

/// Reduce stored records to report rows ordered by date, then symbol.
pub fn aggregate(stored: &[StoredRecord], distinct: bool) -> Vec<WeeklyAggregateRow> {
    let mut rows: Vec<WeeklyAggregateRow> = stored
        .iter()
        .map(|s| WeeklyAggregateRow::from(&s.record))
        .collect();
    if !distinct {
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));
        return rows;
    }
    // equal prices must be adjacent for dedup
    rows.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.symbol.cmp(&b.symbol))
            .then_with(|| match (a.avg_price, b.avg_price) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (x, y) => x.is_some().cmp(&y.is_some()),
            })
    });
    rows.dedup_by(|a, b| {
        a.date == b.date
            && a.symbol == b.symbol
            && a.avg_price.map(f64::to_bits) == b.avg_price.map(f64::to_bits)
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::daily_record::DailyRecord;
    use chrono::{TimeZone, Utc};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, d).unwrap()
    }

    fn stored(symbol: &str, day: u32, high: f64, low: f64, stamp: i64) -> StoredRecord {
        StoredRecord {
            record: DailyRecord {
                symbol: symbol.into(),
                date: date(day),
                open: Some(low),
                high: Some(high),
                low: Some(low),
                close: Some(high),
                volume: Some(10),
            },
            committed_at: Utc.timestamp_opt(stamp, 0).unwrap(),
        }
    }

    #[test]
    fn orders_by_date_then_symbol() {
        let records = vec![
            stored("GOOG", 6, 4.0, 2.0, 1),
            stored("AMZN", 6, 4.0, 2.0, 1),
            stored("GOOG", 5, 4.0, 2.0, 1),
        ];
        let rows = aggregate(&records, false);
        let keys: Vec<_> = rows.iter().map(|r| (r.date, r.symbol.as_str())).collect();
        assert_eq!(keys, vec![(date(5), "GOOG"), (date(6), "AMZN"), (date(6), "GOOG")]);
    }

    #[test]
    fn avg_price_is_exact_midpoint() {
        let rows = aggregate(&[stored("AMZN", 5, 122.0, 119.0, 1)], false);
        assert_eq!(rows[0].avg_price, Some(120.5));
    }

    #[test]
    fn empty_records_have_no_average() {
        let records = vec![StoredRecord {
            record: DailyRecord::empty("GOOG", date(5)),
            committed_at: Utc.timestamp_opt(1, 0).unwrap(),
        }];
        assert_eq!(aggregate(&records, false)[0].avg_price, None);
    }

    #[test]
    fn copies_are_kept_unless_distinct() {
        let records = vec![stored("AMZN", 5, 4.0, 2.0, 1), stored("AMZN", 5, 4.0, 2.0, 2)];
        assert_eq!(aggregate(&records, false).len(), 2);
        assert_eq!(aggregate(&records, true).len(), 1);
    }

    #[test]
    fn distinct_keeps_differing_prices() {
        let records = vec![stored("AMZN", 5, 4.0, 2.0, 1), stored("AMZN", 5, 6.0, 2.0, 2)];
        assert_eq!(aggregate(&records, true).len(), 2);
    }
}
