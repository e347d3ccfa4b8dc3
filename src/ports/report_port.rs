//! Report rendering port trait.

use crate::domain::daily_record::WeeklyAggregateRow;
use crate::domain::error::PipelineError;
use chrono::NaiveDate;
use std::path::PathBuf;

/// Port for rendering a weekly aggregate into an artifact.
pub trait ReportPort {
    /// Returns the location of the primary artifact.
    fn render(
        &self,
        week_start: NaiveDate,
        rows: &[WeeklyAggregateRow],
    ) -> Result<PathBuf, PipelineError>;
}
