#![allow(dead_code)]

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use stockflow::domain::daily_record::{StoredRecord, WeeklyAggregateRow};
use stockflow::domain::error::{FetchError, PipelineError};
use stockflow::domain::loader::{LoadBatch, LoadMode};
use stockflow::domain::pipeline_config::PipelineConfig;
use stockflow::domain::raw_snapshot::{RawSnapshot, snapshot_key};
use stockflow::ports::market_data_port::MarketDataPort;
use stockflow::ports::raw_store_port::{PutOutcome, RawStorePort};
use stockflow::ports::report_port::ReportPort;
use stockflow::ports::sink_port::SinkPort;

/// Shared, ordered record of what every mock saw.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Defaults for tests: no request spacing so runs finish immediately.
pub fn test_config(symbols: &[&str]) -> PipelineConfig {
    PipelineConfig {
        request_spacing: std::time::Duration::ZERO,
        ..PipelineConfig::for_symbols(symbols)
    }
}

/// A provider body holding one entry per `(date, open, high, low, close, volume)`.
pub fn series_body(entries: &[(NaiveDate, f64, f64, f64, f64, i64)]) -> Vec<u8> {
    let mut series = Map::new();
    for (date, open, high, low, close, volume) in entries {
        series.insert(
            date.format("%Y-%m-%d").to_string(),
            json!({
                "1. open": format!("{open:.4}"),
                "2. high": format!("{high:.4}"),
                "3. low": format!("{low:.4}"),
                "4. close": format!("{close:.4}"),
                "5. volume": volume.to_string(),
            }),
        );
    }
    serde_json::to_vec(&json!({
        "Meta Data": {"1. Information": "Daily Prices"},
        "Time Series (Daily)": Value::Object(series),
    }))
    .unwrap()
}

/// Market data port answering from per-symbol scripts. Once a script is
/// exhausted the symbol's fallback answer (if any) is repeated. An optional
/// latency keeps each call open so overlapping calls can be counted.
pub struct MockMarketDataPort {
    scripts: Mutex<HashMap<String, VecDeque<Result<Vec<u8>, FetchError>>>>,
    fallback: HashMap<String, Result<Vec<u8>, FetchError>>,
    calls: Mutex<Vec<(String, Instant)>>,
    events: Option<EventLog>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockMarketDataPort {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            events: None,
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Most calls that were ever open at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn with_events(mut self, events: &EventLog) -> Self {
        self.events = Some(events.clone());
        self
    }

    pub fn script(self, symbol: &str, responses: Vec<Result<Vec<u8>, FetchError>>) -> Self {
        self.scripts
            .lock()
            .insert(symbol.to_string(), responses.into_iter().collect());
        self
    }

    pub fn always(mut self, symbol: &str, response: Result<Vec<u8>, FetchError>) -> Self {
        self.fallback.insert(symbol.to_string(), response);
        self
    }

    pub fn calls_for(&self, symbol: &str) -> usize {
        self.calls.lock().iter().filter(|(s, _)| s == symbol).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        let mut times: Vec<Instant> = self.calls.lock().iter().map(|(_, t)| *t).collect();
        times.sort();
        times
    }
}

impl MarketDataPort for MockMarketDataPort {
    fn fetch_daily_series(&self, symbol: &str) -> Result<Vec<u8>, FetchError> {
        let open = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(open, Ordering::SeqCst);
        self.calls.lock().push((symbol.to_string(), Instant::now()));
        if let Some(events) = &self.events {
            events.lock().push(format!("fetch {symbol}"));
        }
        let scripted = self
            .scripts
            .lock()
            .get_mut(symbol)
            .and_then(VecDeque::pop_front);
        let response = scripted
            .or_else(|| self.fallback.get(symbol).cloned())
            .unwrap_or(Err(FetchError::HttpStatus { status: 404 }));
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

#[derive(Default)]
pub struct MemoryRawStore {
    pub snapshots: Mutex<HashMap<String, RawSnapshot>>,
}

impl MemoryRawStore {
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.snapshots.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl RawStorePort for MemoryRawStore {
    fn put(&self, snapshot: &RawSnapshot) -> Result<PutOutcome, PipelineError> {
        let mut snapshots = self.snapshots.lock();
        if snapshots.contains_key(&snapshot.key()) {
            return Ok(PutOutcome::AlreadyPresent);
        }
        snapshots.insert(snapshot.key(), snapshot.clone());
        Ok(PutOutcome::Written)
    }

    fn get(&self, symbol: &str, date: NaiveDate) -> Result<Option<RawSnapshot>, PipelineError> {
        Ok(self.snapshots.lock().get(&snapshot_key(symbol, date)).cloned())
    }
}

/// Append/upsert sink held in memory, with injectable failures.
#[derive(Default)]
pub struct MemorySink {
    pub rows: Mutex<Vec<StoredRecord>>,
    pub batches: Mutex<Vec<LoadBatch>>,
    pub fail_schema: bool,
    pub fail_insert_on: Option<NaiveDate>,
    pub events: Option<EventLog>,
}

impl MemorySink {
    pub fn with_events(events: &EventLog) -> Self {
        Self {
            events: Some(events.clone()),
            ..Self::default()
        }
    }

    fn log(&self, event: String) {
        if let Some(events) = &self.events {
            events.lock().push(event);
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }
}

impl SinkPort for MemorySink {
    fn ensure_schema(&self) -> Result<(), PipelineError> {
        self.log("schema".into());
        if self.fail_schema {
            return Err(PipelineError::Database {
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }

    fn insert_batch(&self, batch: &LoadBatch, mode: LoadMode) -> Result<usize, PipelineError> {
        self.log(format!("load {}", batch.window));
        if self.fail_insert_on == Some(batch.window.date()) {
            return Err(PipelineError::DatabaseQuery {
                reason: "disk I/O error".into(),
            });
        }
        let mut rows = self.rows.lock();
        if mode == LoadMode::Upsert {
            rows.retain(|r| {
                !batch
                    .records
                    .iter()
                    .any(|b| b.symbol == r.record.symbol && b.date == r.record.date)
            });
        }
        rows.extend(batch.records.iter().map(|record| StoredRecord {
            record: record.clone(),
            committed_at: batch.committed_at,
        }));
        self.batches.lock().push(batch.clone());
        Ok(batch.len())
    }

    fn query_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StoredRecord>, PipelineError> {
        let mut rows: Vec<StoredRecord> = self
            .rows
            .lock()
            .iter()
            .filter(|r| r.record.date >= start && r.record.date < end)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.record
                .date
                .cmp(&b.record.date)
                .then_with(|| a.record.symbol.cmp(&b.record.symbol))
                .then_with(|| a.committed_at.cmp(&b.committed_at))
        });
        Ok(rows)
    }
}

#[derive(Default)]
pub struct RecordingReportPort {
    pub renders: Mutex<Vec<(NaiveDate, Vec<WeeklyAggregateRow>)>>,
    pub fail: bool,
    pub events: Option<EventLog>,
}

impl RecordingReportPort {
    pub fn with_events(events: &EventLog) -> Self {
        Self {
            events: Some(events.clone()),
            ..Self::default()
        }
    }

    pub fn weeks(&self) -> Vec<NaiveDate> {
        self.renders.lock().iter().map(|(week, _)| *week).collect()
    }
}

impl ReportPort for RecordingReportPort {
    fn render(
        &self,
        week_start: NaiveDate,
        rows: &[WeeklyAggregateRow],
    ) -> Result<PathBuf, PipelineError> {
        if let Some(events) = &self.events {
            events.lock().push(format!("report {week_start}"));
        }
        if self.fail {
            return Err(PipelineError::Report {
                reason: "renderer unavailable".into(),
            });
        }
        self.renders.lock().push((week_start, rows.to_vec()));
        Ok(PathBuf::from(format!(
            "{}_weekly_report.svg",
            week_start.format("%Y%m%d")
        )))
    }
}
