//! Raw snapshot persistence port trait.

use crate::domain::error::PipelineError;
use crate::domain::raw_snapshot::RawSnapshot;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Written,
    /// A snapshot already exists under the key and was left untouched.
    AlreadyPresent,
}

/// Write-once store keyed by (symbol, date).
pub trait RawStorePort: Send + Sync {
    fn put(&self, snapshot: &RawSnapshot) -> Result<PutOutcome, PipelineError>;

    fn get(&self, symbol: &str, date: NaiveDate) -> Result<Option<RawSnapshot>, PipelineError>;
}
