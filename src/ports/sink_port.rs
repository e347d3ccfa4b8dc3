//! Relational sink port trait.

use crate::domain::daily_record::StoredRecord;
use crate::domain::error::PipelineError;
use crate::domain::loader::{LoadBatch, LoadMode};
use chrono::NaiveDate;

pub trait SinkPort {
    /// Create the schema and table if absent. Losing a creation race to a
    /// concurrent run is not an error.
    fn ensure_schema(&self) -> Result<(), PipelineError>;

    /// Write every row of the batch atomically, returning the row count.
    fn insert_batch(&self, batch: &LoadBatch, mode: LoadMode) -> Result<usize, PipelineError>;

    /// Rows with `start <= date < end`, ordered by date, symbol, then commit time.
    fn query_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StoredRecord>, PipelineError>;
}
