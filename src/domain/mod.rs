//! Pipeline domain: run windows, fetch jobs, normalization, loading and reporting.

pub mod config_validation;
pub mod daily_record;
pub mod error;
pub mod loader;
pub mod market_data;
pub mod normalizer;
pub mod orchestrator;
pub mod pipeline_config;
pub mod rate_limiter;
pub mod raw_snapshot;
pub mod reporter;
pub mod retry;
pub mod run_window;
pub mod universe;
