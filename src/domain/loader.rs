//! Merges one window's records into a single provenance-stamped batch and
//! commits it through the sink.

use crate::domain::daily_record::DailyRecord;
use crate::domain::error::PipelineError;
use crate::domain::run_window::RunWindow;
use crate::ports::sink_port::SinkPort;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::info;

/// How a rerun of an already-loaded window lands in the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Every run adds rows; runs are told apart by commit timestamp.
    Append,
    /// Rows with the same (symbol, date) are replaced.
    Upsert,
}

/// All records of one window, in configured symbol order, sharing one commit
/// timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBatch {
    pub window: RunWindow,
    pub committed_at: DateTime<Utc>,
    pub records: Vec<DailyRecord>,
}

impl LoadBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct Loader<'a> {
    sink: &'a dyn SinkPort,
    symbols: &'a [String],
    mode: LoadMode,
}

impl<'a> Loader<'a> {
    pub fn new(sink: &'a dyn SinkPort, symbols: &'a [String], mode: LoadMode) -> Self {
        Self {
            sink,
            symbols,
            mode,
        }
    }

    /// Check that `records` holds exactly one record per configured symbol for
    /// this window, then order and stamp them.
    pub fn prepare(
        &self,
        window: RunWindow,
        records: Vec<DailyRecord>,
        committed_at: DateTime<Utc>,
    ) -> Result<LoadBatch, PipelineError> {
        let incomplete = |reason: String| PipelineError::IncompleteBatch {
            date: window.date(),
            expected: self.symbols.len(),
            got: records.len(),
            reason,
        };

        if records.len() != self.symbols.len() {
            let present: HashSet<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
            let missing: Vec<&str> = self
                .symbols
                .iter()
                .map(String::as_str)
                .filter(|s| !present.contains(s))
                .collect();
            let reason = if missing.is_empty() {
                "unexpected extra records".to_string()
            } else {
                format!("missing {}", missing.join(", "))
            };
            return Err(incomplete(reason));
        }

        if let Some(stray) = records.iter().find(|r| r.date != window.date()) {
            return Err(incomplete(format!(
                "{} record dated {}",
                stray.symbol, stray.date
            )));
        }

        let mut ordered = Vec::with_capacity(records.len());
        for symbol in self.symbols {
            let mut matching = records.iter().filter(|r| &r.symbol == symbol);
            match (matching.next(), matching.next()) {
                (Some(record), None) => ordered.push(record.clone()),
                (None, _) => return Err(incomplete(format!("missing {symbol}"))),
                (Some(_), Some(_)) => return Err(incomplete(format!("duplicate {symbol}"))),
            }
        }

        Ok(LoadBatch {
            window,
            committed_at,
            records: ordered,
        })
    }

    /// Commit the window's records, returning the number of rows written.
    pub fn load(
        &self,
        window: RunWindow,
        records: Vec<DailyRecord>,
    ) -> Result<usize, PipelineError> {
        let batch = self.prepare(window, records, Utc::now())?;
        let written = self.sink.insert_batch(&batch, self.mode)?;
        info!(
            window = %window,
            rows = written,
            committed_at = %batch.committed_at,
            mode = ?self.mode,
            "batch committed"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::daily_record::StoredRecord;
    use chrono::NaiveDate;
    use std::cell::RefCell;

    #[derive(Default)]
    struct CapturingSink {
        batches: RefCell<Vec<(LoadBatch, LoadMode)>>,
    }

    impl SinkPort for CapturingSink {
        fn ensure_schema(&self) -> Result<(), PipelineError> {
            Ok(())
        }

        fn insert_batch(&self, batch: &LoadBatch, mode: LoadMode) -> Result<usize, PipelineError> {
            self.batches.borrow_mut().push((batch.clone(), mode));
            Ok(batch.len())
        }

        fn query_range(
            &self,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<StoredRecord>, PipelineError> {
            Ok(Vec::new())
        }
    }

    fn window() -> RunWindow {
        RunWindow::new(NaiveDate::from_ymd_opt(2023, 6, 5).unwrap()).unwrap()
    }

    fn symbols() -> Vec<String> {
        vec!["AMZN".to_string(), "GOOG".to_string()]
    }

    fn record(symbol: &str) -> DailyRecord {
        DailyRecord {
            high: Some(10.0),
            low: Some(8.0),
            ..DailyRecord::empty(symbol, window().date())
        }
    }

    #[test]
    fn orders_records_by_configured_symbols() {
        let sink = CapturingSink::default();
        let symbols = symbols();
        let loader = Loader::new(&sink, &symbols, LoadMode::Append);
        let batch = loader
            .prepare(window(), vec![record("GOOG"), record("AMZN")], Utc::now())
            .unwrap();
        let order: Vec<_> = batch.records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["AMZN", "GOOG"]);
    }

    #[test]
    fn load_writes_one_batch_with_mode() {
        let sink = CapturingSink::default();
        let symbols = symbols();
        let loader = Loader::new(&sink, &symbols, LoadMode::Upsert);
        let written = loader
            .load(window(), vec![record("AMZN"), record("GOOG")])
            .unwrap();
        assert_eq!(written, 2);
        let batches = sink.batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].1, LoadMode::Upsert);
    }

    #[test]
    fn rejects_missing_symbol() {
        let sink = CapturingSink::default();
        let symbols = symbols();
        let loader = Loader::new(&sink, &symbols, LoadMode::Append);
        match loader.load(window(), vec![record("AMZN")]) {
            Err(PipelineError::IncompleteBatch {
                expected,
                got,
                reason,
                ..
            }) => {
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
                assert_eq!(reason, "missing GOOG");
            }
            other => panic!("expected IncompleteBatch, got {other:?}"),
        }
        assert!(sink.batches.borrow().is_empty());
    }

    #[test]
    fn rejects_extra_records() {
        let sink = CapturingSink::default();
        let symbols = symbols();
        let loader = Loader::new(&sink, &symbols, LoadMode::Append);
        let result = loader.load(
            window(),
            vec![record("AMZN"), record("GOOG"), record("MSFT")],
        );
        assert!(matches!(result, Err(PipelineError::IncompleteBatch { got: 3, .. })));
    }

    #[test]
    fn rejects_duplicate_with_right_count() {
        let sink = CapturingSink::default();
        let symbols = symbols();
        let loader = Loader::new(&sink, &symbols, LoadMode::Append);
        let result = loader.prepare(window(), vec![record("AMZN"), record("AMZN")], Utc::now());
        assert!(matches!(result, Err(PipelineError::IncompleteBatch { .. })));
    }

    #[test]
    fn rejects_record_from_other_window() {
        let sink = CapturingSink::default();
        let symbols = symbols();
        let loader = Loader::new(&sink, &symbols, LoadMode::Append);
        let mut stray = record("GOOG");
        stray.date = NaiveDate::from_ymd_opt(2023, 6, 6).unwrap();
        let result = loader.prepare(window(), vec![record("AMZN"), stray], Utc::now());
        assert!(matches!(result, Err(PipelineError::IncompleteBatch { .. })));
    }
}
