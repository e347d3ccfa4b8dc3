//! Configuration validation.
//!
//! Each helper reads one key, checks it, and returns the typed value so the
//! config builder never sees an unchecked value.

use crate::domain::error::PipelineError;
use crate::domain::loader::LoadMode;
use crate::domain::pipeline_config::{Backend, PipelineConfig, ReportSchedule};
use crate::domain::retry::Backoff;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::time::Duration;

pub fn validate_pipeline_config(config: &dyn ConfigPort) -> Result<(), PipelineError> {
    PipelineConfig::from_config(config).map(|_| ())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> PipelineError {
    PipelineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub(crate) fn required_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, PipelineError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(PipelineError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

pub(crate) fn optional_string(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn symbols(config: &dyn ConfigPort) -> Result<Vec<String>, PipelineError> {
    let raw = required_string(config, "pipeline", "symbols")?;
    parse_symbols(&raw).map_err(|e| invalid("pipeline", "symbols", e.to_string()))
}

/// Schema and table names are interpolated into DDL, so only plain SQL
/// identifiers are accepted.
pub(crate) fn identifier(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: &str,
) -> Result<String, PipelineError> {
    let value = optional_string(config, section, key).unwrap_or_else(|| default.to_string());
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid(
            section,
            key,
            format!("'{value}' is not a plain SQL identifier"),
        ));
    }
    Ok(value.to_lowercase())
}

/// Longest catchup horizon accepted for `lookback_days` (about forty years).
pub const MAX_LOOKBACK_DAYS: i64 = 10_000;

/// Integer value of `key`, or `default` when absent. Text that does not
/// parse is rejected rather than replaced by the default.
pub(crate) fn int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, PipelineError> {
    match optional_string(config, section, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| invalid(section, key, format!("'{raw}' is not an integer"))),
    }
}

pub(crate) fn positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, PipelineError> {
    let value = int(config, section, key, default)?;
    if value < 1 {
        return Err(invalid(section, key, format!("{key} must be at least 1")));
    }
    Ok(value)
}

pub(crate) fn non_negative_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<u64, PipelineError> {
    let value = int(config, section, key, default)?;
    u64::try_from(value).map_err(|_| invalid(section, key, format!("{key} must be non-negative")))
}

pub(crate) fn lookback_days(config: &dyn ConfigPort) -> Result<usize, PipelineError> {
    let value = positive_int(config, "pipeline", "lookback_days", 15)?;
    if value > MAX_LOOKBACK_DAYS {
        return Err(invalid(
            "pipeline",
            "lookback_days",
            format!("lookback_days must be at most {MAX_LOOKBACK_DAYS}"),
        ));
    }
    Ok(value as usize)
}

/// TCP port number.
pub(crate) fn port(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u16,
) -> Result<u16, PipelineError> {
    let value = int(config, section, key, i64::from(default))?;
    u16::try_from(value)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| invalid(section, key, format!("{value} is not a valid port")))
}

/// A duration given in (possibly fractional) seconds.
pub(crate) fn seconds(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<Duration, PipelineError> {
    let value = match optional_string(config, section, key) {
        None => default,
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|_| invalid(section, key, format!("'{raw}' is not a number")))?,
    };
    Duration::try_from_secs_f64(value)
        .map_err(|_| invalid(section, key, format!("{key} must be a non-negative number of seconds")))
}

pub(crate) fn max_active_runs(config: &dyn ConfigPort) -> Result<u32, PipelineError> {
    if int(config, "pipeline", "max_active_runs", 1)? != 1 {
        return Err(invalid(
            "pipeline",
            "max_active_runs",
            "only one run window may be active at a time",
        ));
    }
    Ok(1)
}

pub(crate) fn start_date(config: &dyn ConfigPort) -> Result<Option<NaiveDate>, PipelineError> {
    optional_string(config, "pipeline", "start_date")
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|_| invalid("pipeline", "start_date", "invalid date format, expected YYYY-MM-DD"))
        })
        .transpose()
}

pub(crate) fn backoff(config: &dyn ConfigPort) -> Result<Backoff, PipelineError> {
    match optional_string(config, "pipeline", "retry_backoff")
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        None | Some("fixed") => Ok(Backoff::Fixed),
        Some("exponential") => Ok(Backoff::Exponential),
        Some(other) => Err(invalid(
            "pipeline",
            "retry_backoff",
            format!("unknown backoff '{other}', expected fixed or exponential"),
        )),
    }
}

pub(crate) fn load_mode(config: &dyn ConfigPort) -> Result<LoadMode, PipelineError> {
    match optional_string(config, "pipeline", "load_mode")
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        None | Some("append") => Ok(LoadMode::Append),
        Some("upsert") => Ok(LoadMode::Upsert),
        Some(other) => Err(invalid(
            "pipeline",
            "load_mode",
            format!("unknown load mode '{other}', expected append or upsert"),
        )),
    }
}

pub(crate) fn report_schedule(config: &dyn ConfigPort) -> Result<ReportSchedule, PipelineError> {
    match optional_string(config, "pipeline", "report_schedule")
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        None | Some("end_of_week") => Ok(ReportSchedule::EndOfWeek),
        Some("every_window") => Ok(ReportSchedule::EveryWindow),
        Some(other) => Err(invalid(
            "pipeline",
            "report_schedule",
            format!("unknown schedule '{other}', expected end_of_week or every_window"),
        )),
    }
}

pub(crate) fn backend(config: &dyn ConfigPort) -> Result<Backend, PipelineError> {
    match optional_string(config, "database", "backend")
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        None | Some("sqlite") => Ok(Backend::Sqlite),
        Some("postgres") | Some("postgresql") => Ok(Backend::Postgres),
        Some(other) => Err(invalid(
            "database",
            "backend",
            format!("unknown backend '{other}', expected sqlite or postgres"),
        )),
    }
}

pub(crate) fn output_size(config: &dyn ConfigPort) -> Result<Option<String>, PipelineError> {
    match optional_string(config, "api", "output_size").map(|s| s.to_lowercase()) {
        None => Ok(None),
        Some(s) if s == "compact" || s == "full" => Ok(Some(s)),
        Some(other) => Err(invalid(
            "api",
            "output_size",
            format!("unknown output size '{other}', expected compact or full"),
        )),
    }
}
