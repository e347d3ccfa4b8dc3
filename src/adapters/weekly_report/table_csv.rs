//! CSV table of the weekly aggregate rows.

use crate::domain::daily_record::WeeklyAggregateRow;
use crate::domain::error::PipelineError;
use std::io::Write;

/// Header `symbol,date,avg_price`; an absent price is an empty field.
pub fn write_rows<W: Write>(writer: W, rows: &[WeeklyAggregateRow]) -> Result<(), PipelineError> {
    let report_err = |e: csv::Error| PipelineError::Report {
        reason: e.to_string(),
    };
    let mut csv_writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        csv_writer
            .write_record(["symbol", "date", "avg_price"])
            .map_err(report_err)?;
    }
    for row in rows {
        csv_writer.serialize(row).map_err(report_err)?;
    }
    csv_writer.flush()?;
    Ok(())
}
