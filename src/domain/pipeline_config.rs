//! Immutable pipeline configuration, built once from a [`ConfigPort`].

use crate::domain::config_validation as check;
use crate::domain::error::PipelineError;
use crate::domain::loader::LoadMode;
use crate::domain::retry::RetryPolicy;
use crate::domain::run_window::{self, RunWindow};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
pub const DEFAULT_FUNCTION: &str = "TIME_SERIES_DAILY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub function: String,
    pub api_key: String,
    pub output_size: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSchedule {
    /// Report when a window closes its week.
    EndOfWeek,
    /// Re-render the week-to-date report after every window.
    EveryWindow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub symbols: Vec<String>,
    pub api: ApiConfig,
    pub backend: Backend,
    pub schema: String,
    pub table: String,
    pub start_date: Option<NaiveDate>,
    pub lookback_days: usize,
    pub max_active_runs: u32,
    pub max_concurrent_fetches: usize,
    pub retry: RetryPolicy,
    pub request_spacing: Duration,
    pub replay_raw: bool,
    pub load_mode: LoadMode,
    pub report_schedule: ReportSchedule,
    pub report_distinct: bool,
    pub raw_dir: PathBuf,
    pub report_dir: PathBuf,
}

impl PipelineConfig {
    /// Defaults for everything except the symbol list and credentials.
    pub fn for_symbols(symbols: &[&str]) -> Self {
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            api: ApiConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                function: DEFAULT_FUNCTION.to_string(),
                api_key: String::new(),
                output_size: None,
                timeout: Duration::from_secs(30),
            },
            backend: Backend::Sqlite,
            schema: "stocks".to_string(),
            table: "daily_ticker".to_string(),
            start_date: None,
            lookback_days: 15,
            max_active_runs: 1,
            max_concurrent_fetches: 4,
            retry: RetryPolicy::default(),
            request_spacing: Duration::from_secs(61),
            replay_raw: false,
            load_mode: LoadMode::Append,
            report_schedule: ReportSchedule::EndOfWeek,
            report_distinct: false,
            raw_dir: PathBuf::from("daily_stock_data"),
            report_dir: PathBuf::from("daily_stock_report"),
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PipelineError> {
        let api_key = check::required_string(config, "api", "key")?;
        let symbols = check::symbols(config)?;
        let defaults = Self::for_symbols(&[]);

        let api = ApiConfig {
            base_url: check::optional_string(config, "api", "base_url")
                .unwrap_or(defaults.api.base_url),
            function: check::optional_string(config, "api", "function")
                .unwrap_or(defaults.api.function),
            api_key,
            output_size: check::output_size(config)?,
            timeout: Duration::from_secs(check::positive_int(config, "api", "timeout_secs", 30)? as u64),
        };

        let max_attempts = check::positive_int(config, "pipeline", "max_attempts", 3)?;
        let retry = RetryPolicy {
            max_attempts: u32::try_from(max_attempts).unwrap_or(u32::MAX),
            delay: Duration::from_secs(check::non_negative_int(
                config,
                "pipeline",
                "retry_delay_secs",
                0,
            )?),
            backoff: check::backoff(config)?,
        };

        Ok(Self {
            symbols,
            api,
            backend: check::backend(config)?,
            schema: check::identifier(config, "database", "schema", &defaults.schema)?,
            table: check::identifier(config, "database", "table", &defaults.table)?,
            start_date: check::start_date(config)?,
            lookback_days: check::lookback_days(config)?,
            max_active_runs: check::max_active_runs(config)?,
            max_concurrent_fetches: check::positive_int(
                config,
                "pipeline",
                "max_concurrent_fetches",
                4,
            )? as usize,
            retry,
            request_spacing: check::seconds(config, "pipeline", "request_spacing_secs", 61.0)?,
            replay_raw: config.get_bool("pipeline", "replay_raw", false),
            load_mode: check::load_mode(config)?,
            report_schedule: check::report_schedule(config)?,
            report_distinct: config.get_bool("pipeline", "report_distinct", false),
            raw_dir: check::optional_string(config, "storage", "raw_dir")
                .map(PathBuf::from)
                .unwrap_or(defaults.raw_dir),
            report_dir: check::optional_string(config, "storage", "report_dir")
                .map(PathBuf::from)
                .unwrap_or(defaults.report_dir),
        })
    }

    /// Windows a catchup run as of `as_of` processes: from `start_date` when
    /// configured, otherwise the `lookback_days` most recent closed windows.
    pub fn catchup_windows(&self, as_of: NaiveDate) -> Vec<RunWindow> {
        let Some(latest) = run_window::latest_closed_window(as_of) else {
            return Vec::new();
        };
        match self.start_date {
            Some(start) => run_window::catchup(start, latest.date()),
            None => run_window::lookback(as_of, self.lookback_days),
        }
    }
}
