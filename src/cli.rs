//! CLI definition and dispatch.

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use crate::adapters::alpha_vantage_adapter::AlphaVantageAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::file_raw_store::FileRawStore;
use crate::adapters::weekly_report::SvgReportAdapter;
use crate::domain::error::PipelineError;
use crate::domain::orchestrator::{Orchestrator, Ports, RunSummary};
use crate::domain::pipeline_config::{Backend, PipelineConfig};
use crate::domain::reporter::Reporter;
use crate::domain::run_window::{self, RunWindow};
use crate::ports::config_port::ConfigPort;
use crate::ports::sink_port::SinkPort;

/// Exit status of a run in which at least one window failed.
pub const EXIT_WINDOW_FAILED: u8 = 6;

#[derive(Parser, Debug)]
#[command(
    name = "stockflow",
    about = "Daily market data ingestion with weekly reporting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub struct WindowArgs {
    #[arg(short, long)]
    pub config: PathBuf,
    /// Treat this date as today (default: current UTC date)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,
    /// First window of an explicit range
    #[arg(long)]
    pub start: Option<NaiveDate>,
    /// Last window of an explicit range
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, load and report every window in the catchup range
    Run(WindowArgs),
    /// List the windows a run would process, without running them
    Windows(WindowArgs),
    /// Render the weekly report for the week containing a date
    Report {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        week: NaiveDate,
    },
    /// Create the target schema and table if absent
    InitSchema {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a pipeline configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Run(args) => run_pipeline(&args),
        Command::Windows(args) => run_windows(&args),
        Command::Report { config, week } => run_report(&config, week),
        Command::InitSchema { config } => run_init_schema(&config),
        Command::Validate { config } => run_validate(&config),
    };
    result.unwrap_or_else(|e| {
        error!(error = %e, "command failed");
        eprintln!("error: {e}");
        (&e).into()
    })
}

pub fn load_config(path: &PathBuf) -> Result<(FileConfigAdapter, PipelineConfig), PipelineError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    let pipeline = PipelineConfig::from_config(&adapter)?;
    Ok((adapter, pipeline))
}

/// Windows to process: an explicit `--start`/`--end` range, or the configured
/// catchup horizon ending at the latest closed window before `as_of`.
pub fn resolve_windows(
    pipeline: &PipelineConfig,
    as_of: NaiveDate,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<RunWindow>, PipelineError> {
    match (start, end) {
        (None, None) => Ok(pipeline.catchup_windows(as_of)),
        (Some(start), end) => {
            let Some(end) =
                end.or_else(|| run_window::latest_closed_window(as_of).map(|w| w.date()))
            else {
                return Ok(Vec::new());
            };
            if start > end {
                return Err(PipelineError::ConfigInvalid {
                    section: "cli".into(),
                    key: "start".into(),
                    reason: format!("start {start} is after end {end}"),
                });
            }
            Ok(run_window::catchup(start, end))
        }
        (None, Some(end)) => Ok(vec![RunWindow::new(end)?]),
    }
}

/// Open the configured relational sink.
pub fn open_sink(
    config: &dyn ConfigPort,
    pipeline: &PipelineConfig,
) -> Result<Box<dyn SinkPort>, PipelineError> {
    match pipeline.backend {
        Backend::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                use crate::adapters::sqlite_adapter::SqliteAdapter;
                let sink = SqliteAdapter::from_config(config, &pipeline.schema, &pipeline.table)?;
                Ok(Box::new(sink))
            }
            #[cfg(not(feature = "sqlite"))]
            {
                let _ = config;
                Err(missing_feature("sqlite"))
            }
        }
        Backend::Postgres => {
            #[cfg(feature = "postgres")]
            {
                use crate::adapters::postgres_adapter::PostgresAdapter;
                let sink = PostgresAdapter::from_config(config, &pipeline.schema, &pipeline.table)?;
                Ok(Box::new(sink))
            }
            #[cfg(not(feature = "postgres"))]
            {
                let _ = config;
                Err(missing_feature("postgres"))
            }
        }
    }
}

#[allow(dead_code)]
fn missing_feature(feature: &str) -> PipelineError {
    PipelineError::ConfigInvalid {
        section: "database".into(),
        key: "backend".into(),
        reason: format!("stockflow was built without the `{feature}` feature"),
    }
}

/// One line per window, suitable for stdout.
pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    for outcome in &summary.windows {
        let status = match &outcome.failure {
            None => "completed".to_string(),
            Some(failure) => format!("{} failed: {}", failure.stage, failure.error),
        };
        out.push_str(&format!(
            "{} {} rows={}",
            outcome.window, status, outcome.rows_committed
        ));
        let nulls = outcome.null_symbols();
        if !nulls.is_empty() {
            out.push_str(&format!(" null={}", nulls.join(",")));
        }
        if let Some(report) = &outcome.report {
            out.push_str(&format!(" report={}", report.artifact.display()));
        }
        out.push('\n');
    }
    out
}

pub fn summary_exit_status(summary: &RunSummary) -> u8 {
    if summary.is_success() {
        0
    } else {
        EXIT_WINDOW_FAILED
    }
}

fn run_pipeline(args: &WindowArgs) -> Result<ExitCode, PipelineError> {
    let (config, pipeline) = load_config(&args.config)?;
    let as_of = args.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let windows = resolve_windows(&pipeline, as_of, args.start, args.end)?;
    if windows.is_empty() {
        info!(as_of = %as_of, "no windows to process");
        return Ok(ExitCode::SUCCESS);
    }

    let sink = open_sink(&config, &pipeline)?;
    let market_data = AlphaVantageAdapter::new(pipeline.api.clone())?;
    let raw_store = FileRawStore::new(&pipeline.raw_dir);
    let report = SvgReportAdapter::new(&pipeline.report_dir);

    info!(
        windows = windows.len(),
        first = %windows[0],
        last = %windows[windows.len() - 1],
        "run started"
    );
    let orchestrator = Orchestrator::new(
        &pipeline,
        Ports {
            market_data: &market_data,
            raw_store: &raw_store,
            sink: sink.as_ref(),
            report: &report,
        },
    );
    let summary = orchestrator.run(&windows);

    print!("{}", format_summary(&summary));
    info!(
        windows = summary.windows.len(),
        failed = summary.failed().count(),
        rows = summary.rows_committed(),
        "run finished"
    );
    Ok(ExitCode::from(summary_exit_status(&summary)))
}

fn run_windows(args: &WindowArgs) -> Result<ExitCode, PipelineError> {
    let (_, pipeline) = load_config(&args.config)?;
    let as_of = args.as_of.unwrap_or_else(|| Utc::now().date_naive());
    for window in resolve_windows(&pipeline, as_of, args.start, args.end)? {
        let marker = if window.closes_week() { " (report)" } else { "" };
        println!("{window}{marker}");
    }
    Ok(ExitCode::SUCCESS)
}

fn run_report(config_path: &PathBuf, week: NaiveDate) -> Result<ExitCode, PipelineError> {
    let (config, pipeline) = load_config(config_path)?;
    let sink = open_sink(&config, &pipeline)?;
    sink.ensure_schema()?;
    let renderer = SvgReportAdapter::new(&pipeline.report_dir);
    let report = Reporter::new(sink.as_ref(), &renderer, pipeline.report_distinct).report(week)?;
    println!(
        "{} rows={} report={}",
        report.week_start,
        report.rows.len(),
        report.artifact.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn run_init_schema(config_path: &PathBuf) -> Result<ExitCode, PipelineError> {
    let (config, pipeline) = load_config(config_path)?;
    open_sink(&config, &pipeline)?.ensure_schema()?;
    println!("schema ready: {}.{}", pipeline.schema, pipeline.table);
    Ok(ExitCode::SUCCESS)
}

pub fn run_validate(config_path: &PathBuf) -> Result<ExitCode, PipelineError> {
    let (_, pipeline) = load_config(config_path)?;
    println!(
        "config ok: {} symbols, {:?} backend, {:?} load mode",
        pipeline.symbols.len(),
        pipeline.backend,
        pipeline.load_mode
    );
    Ok(ExitCode::SUCCESS)
}
