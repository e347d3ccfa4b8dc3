//! stockflow: rate-limited market data ingestion with weekly reporting.
//!
//! Hexagonal architecture: pipeline logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
