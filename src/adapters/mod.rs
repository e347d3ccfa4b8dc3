//! Concrete adapter implementations for ports.

pub mod alpha_vantage_adapter;
pub mod file_config_adapter;
pub mod file_raw_store;
#[cfg(feature = "postgres")]
pub mod postgres_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod weekly_report;
