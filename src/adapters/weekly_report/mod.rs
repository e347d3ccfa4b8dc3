//! File-based weekly report rendering.
//!
//! Writes `{YYYYMMDD}_weekly_report.svg` and a `.csv` twin holding the same
//! rows into the configured report directory. The SVG path is returned as the
//! artifact handle.

pub mod chart_svg;
pub mod table_csv;

use crate::domain::daily_record::WeeklyAggregateRow;
use crate::domain::error::PipelineError;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub struct SvgReportAdapter {
    dir: PathBuf,
}

impl SvgReportAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn artifact_stem(week_start: NaiveDate) -> String {
        format!("{}_weekly_report", week_start.format("%Y%m%d"))
    }
}

impl ReportPort for SvgReportAdapter {
    fn render(
        &self,
        week_start: NaiveDate,
        rows: &[WeeklyAggregateRow],
    ) -> Result<PathBuf, PipelineError> {
        let io_err = |path: &Path, e: std::io::Error| PipelineError::Report {
            reason: format!("{}: {e}", path.display()),
        };

        fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        let stem = Self::artifact_stem(week_start);

        let svg_path = self.dir.join(format!("{stem}.svg"));
        fs::write(&svg_path, chart_svg::render_weekly_svg(week_start, rows))
            .map_err(|e| io_err(&svg_path, e))?;

        let csv_path = self.dir.join(format!("{stem}.csv"));
        let file = File::create(&csv_path).map_err(|e| io_err(&csv_path, e))?;
        table_csv::write_rows(BufWriter::new(file), rows)?;

        Ok(svg_path)
    }
}
