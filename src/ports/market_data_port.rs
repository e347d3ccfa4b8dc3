//! Market data access port trait.

use crate::domain::error::FetchError;

/// One request against the provider. Retries, spacing and parsing live in the
/// domain; an implementation only performs a single attempt and returns the
/// unmodified body of a success-status response.
pub trait MarketDataPort: Send + Sync {
    fn fetch_daily_series(&self, symbol: &str) -> Result<Vec<u8>, FetchError>;
}
