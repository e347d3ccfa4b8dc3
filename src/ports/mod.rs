//! Port traits the pipeline talks to; adapters provide the I/O.

pub mod config_port;
pub mod market_data_port;
pub mod raw_store_port;
pub mod report_port;
pub mod sink_port;
