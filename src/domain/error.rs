//! Domain error types.

use chrono::NaiveDate;

/// Why a single fetch attempt failed. Every variant is retried by the fetch
/// state machine until the attempt budget is spent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("provider throttled request: {notice}")]
    Throttled { notice: String },

    #[error("provider error: {message}")]
    Provider { message: String },
}

/// Top-level error type for stockflow.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("incomplete batch for {date}: expected {expected} records, got {got} ({reason})")]
    IncompleteBatch {
        date: NaiveDate,
        expected: usize,
        got: usize,
        reason: String,
    },

    #[error("{date} is not a business day")]
    NotBusinessDay { date: NaiveDate },

    #[error("raw store error for {key}: {reason}")]
    RawStore { key: String, reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Process exit status for a command that stopped on this error.
    pub fn exit_status(&self) -> u8 {
        match self {
            PipelineError::Io(_) | PipelineError::RawStore { .. } => 1,
            PipelineError::ConfigParse { .. }
            | PipelineError::ConfigMissing { .. }
            | PipelineError::ConfigInvalid { .. }
            | PipelineError::NotBusinessDay { .. } => 2,
            PipelineError::Database { .. } | PipelineError::DatabaseQuery { .. } => 3,
            PipelineError::IncompleteBatch { .. } => 4,
            PipelineError::Report { .. } => 5,
        }
    }
}

impl From<&PipelineError> for std::process::ExitCode {
    fn from(err: &PipelineError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
