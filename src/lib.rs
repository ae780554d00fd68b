pub mod aggregate;
pub mod baseline;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fake_source;
pub mod http_client;
pub mod ingest;
pub mod league_baseline;
pub mod nba_fetch;
pub mod normalize;
pub mod raw_table;
pub mod record;
pub mod retry;
pub mod season;
pub mod service;
pub mod store;
mod sync;
pub mod telemetry;
pub mod zscore;
