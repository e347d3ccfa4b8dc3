//! Pipeline engine.
//!
//! Windows are processed strictly one after another. Inside a window the
//! per-symbol fetches fan out over a scoped worker pool, their outcomes come
//! back over a typed channel, and the loader only runs once every job is
//! terminal. A failing window is recorded and the next window still runs.

use crate::domain::daily_record::DailyRecord;
use crate::domain::error::PipelineError;
use crate::domain::loader::Loader;
use crate::domain::market_data::{FetchOutcome, MarketDataClient};
use crate::domain::pipeline_config::{PipelineConfig, ReportSchedule};
use crate::domain::rate_limiter::RateLimiter;
use crate::domain::reporter::{Reporter, WeeklyReport};
use crate::domain::retry::FetchJob;
use crate::domain::run_window::RunWindow;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::raw_store_port::RawStorePort;
use crate::ports::report_port::ReportPort;
use crate::ports::sink_port::SinkPort;
use std::fmt;
use tracing::{error, info};

/// Collaborators the engine drives.
pub struct Ports<'a> {
    pub market_data: &'a dyn MarketDataPort,
    pub raw_store: &'a dyn RawStorePort,
    pub sink: &'a dyn SinkPort,
    pub report: &'a dyn ReportPort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Schema,
    Load,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Schema => write!(f, "schema"),
            Stage::Load => write!(f, "load"),
            Stage::Report => write!(f, "report"),
        }
    }
}

#[derive(Debug)]
pub struct WindowFailure {
    pub stage: Stage,
    pub error: PipelineError,
}

#[derive(Debug)]
pub struct WindowOutcome {
    pub window: RunWindow,
    pub fetches: Vec<FetchOutcome>,
    pub rows_committed: usize,
    pub report: Option<WeeklyReport>,
    pub failure: Option<WindowFailure>,
}

impl WindowOutcome {
    fn new(window: RunWindow) -> Self {
        Self {
            window,
            fetches: Vec::new(),
            rows_committed: 0,
            report: None,
            failure: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Symbols whose fetches exhausted every attempt.
    pub fn null_symbols(&self) -> Vec<&str> {
        self.fetches
            .iter()
            .filter(|f| f.is_exhausted())
            .map(|f| f.symbol.as_str())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub windows: Vec<WindowOutcome>,
}

impl RunSummary {
    pub fn failed(&self) -> impl Iterator<Item = &WindowOutcome> {
        self.windows.iter().filter(|w| !w.is_complete())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn rows_committed(&self) -> usize {
        self.windows.iter().map(|w| w.rows_committed).sum()
    }
}

pub struct Orchestrator<'a> {
    config: &'a PipelineConfig,
    ports: Ports<'a>,
    limiter: RateLimiter,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a PipelineConfig, ports: Ports<'a>) -> Self {
        Self {
            config,
            ports,
            limiter: RateLimiter::new(config.request_spacing),
        }
    }

    pub fn run(&self, windows: &[RunWindow]) -> RunSummary {
        let mut summary = RunSummary::default();
        for &window in windows {
            let outcome = self.run_window(window);
            if let Some(failure) = &outcome.failure {
                error!(
                    window = %window,
                    stage = %failure.stage,
                    error = %failure.error,
                    "window failed"
                );
            }
            summary.windows.push(outcome);
        }
        summary
    }

    pub fn run_window(&self, window: RunWindow) -> WindowOutcome {
        let mut outcome = WindowOutcome::new(window);
        info!(window = %window, symbols = self.config.symbols.len(), "window started");

        if let Err(error) = self.ports.sink.ensure_schema() {
            outcome.failure = Some(WindowFailure {
                stage: Stage::Schema,
                error,
            });
            return outcome;
        }

        outcome.fetches = self.fetch_all(window);
        let records: Vec<DailyRecord> = outcome.fetches.iter().map(|f| f.record.clone()).collect();

        let loader = Loader::new(self.ports.sink, &self.config.symbols, self.config.load_mode);
        match loader.load(window, records) {
            Ok(rows) => outcome.rows_committed = rows,
            Err(error) => {
                outcome.failure = Some(WindowFailure {
                    stage: Stage::Load,
                    error,
                });
                return outcome;
            }
        }

        let due = match self.config.report_schedule {
            ReportSchedule::EndOfWeek => window.closes_week(),
            ReportSchedule::EveryWindow => true,
        };
        if due {
            let reporter = Reporter::new(
                self.ports.sink,
                self.ports.report,
                self.config.report_distinct,
            );
            match reporter.report(window.date()) {
                Ok(report) => outcome.report = Some(report),
                Err(error) => {
                    outcome.failure = Some(WindowFailure {
                        stage: Stage::Report,
                        error,
                    });
                    return outcome;
                }
            }
        }

        info!(
            window = %window,
            rows = outcome.rows_committed,
            null_symbols = ?outcome.null_symbols(),
            "window complete"
        );
        outcome
    }

    /// Fan out one job per symbol and wait for all of them. Outcomes are
    /// returned in configured symbol order.
    fn fetch_all(&self, window: RunWindow) -> Vec<FetchOutcome> {
        let client = MarketDataClient::new(
            self.ports.market_data,
            self.ports.raw_store,
            &self.limiter,
            self.config.retry,
        )
        .with_replay(self.config.replay_raw);
        let workers = self
            .config
            .max_concurrent_fetches
            .clamp(1, self.config.symbols.len().max(1));

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<FetchJob>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<FetchOutcome>();
        for symbol in &self.config.symbols {
            // receiver is alive until the scope below ends
            let _ = job_tx.send(FetchJob::new(symbol, window));
        }
        drop(job_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let client = &client;
                scope.spawn(move || {
                    for job in job_rx.iter() {
                        if result_tx.send(client.fetch(job)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut outcomes: Vec<FetchOutcome> = result_rx.iter().collect();
        outcomes.sort_by_key(|o| {
            self.config
                .symbols
                .iter()
                .position(|s| *s == o.symbol)
                .unwrap_or(usize::MAX)
        });
        outcomes
    }
}
