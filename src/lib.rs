//! NBA team stats pipeline library
//!
//! Extracts a team's regular season game log and per-player box scores from
//! the stats API, writes them into a dated partition as CSV, validates them,
//! stages them and loads them into a warehouse with per-date idempotency.
//!
//! # Examples
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use nba_pipeline::config::Config;
//! use nba_pipeline::data_fetcher::StatsApi;
//! use nba_pipeline::error::AppError;
//! use nba_pipeline::pipeline::{Pipeline, Step};
//! use nba_pipeline::warehouse::SqliteWarehouse;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AppError> {
//!     let config = Config::load(None).await?;
//!     let api = StatsApi::new(&config)?;
//!     let warehouse = SqliteWarehouse::from_settings(&config.warehouse)?;
//!     let pipeline = Pipeline::new(config, api, warehouse);
//!
//!     let run_date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
//!     let summary = pipeline.run(run_date, Step::Extract).await?;
//!     println!("{} rows loaded", summary.rows_loaded());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod data_fetcher;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod scheduler;
pub mod testing_utils;
pub mod warehouse;

// Re-export commonly used types for convenience
pub use config::{Config, ExtractScope};
pub use data_fetcher::StatsApi;
pub use data_fetcher::models::{GameRecord, GameResult, PlayerStatRecord};
pub use error::{AppError, ErrorKind};
pub use pipeline::{Pipeline, RunManifest, RunSummary, Step};
pub use retry::RetryPolicy;
pub use warehouse::{LoadReport, SqliteWarehouse, StagedFile, TargetTable, Warehouse};

/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
