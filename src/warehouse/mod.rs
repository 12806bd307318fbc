//! Warehouse staging and loading
//!
//! The pipeline talks to the warehouse through the [`Warehouse`] trait only.
//! [`SqliteWarehouse`] is the shipped backend: a filesystem stage directory
//! in front of an embedded SQLite database.

use chrono::NaiveDate;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::constants::{files, warehouse};
use crate::data_fetcher::models::{GameRecord, PlayerStatRecord, TableRecord};
use crate::error::AppError;

pub mod sqlite;

pub use sqlite::SqliteWarehouse;

/// Target tables, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTable {
    Games,
    PlayerStats,
}

impl TargetTable {
    pub const ALL: [TargetTable; 2] = [TargetTable::Games, TargetTable::PlayerStats];

    pub fn table_name(&self) -> &'static str {
        match self {
            TargetTable::Games => warehouse::GAMES_TABLE,
            TargetTable::PlayerStats => warehouse::PLAYER_STATS_TABLE,
        }
    }

    /// File name inside a run-date partition.
    pub fn file_name(&self) -> &'static str {
        match self {
            TargetTable::Games => files::GAMES,
            TargetTable::PlayerStats => files::PLAYER_STATS,
        }
    }

    /// Expected CSV header row.
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            TargetTable::Games => GameRecord::HEADER,
            TargetTable::PlayerStats => PlayerStatRecord::HEADER,
        }
    }
}

impl fmt::Display for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A file sitting in the staging area, waiting to be loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFile {
    pub table: TargetTable,
    pub run_date: NaiveDate,
    /// Location inside the staging area
    pub location: PathBuf,
    /// Data rows the extractor wrote
    pub expected_rows: usize,
}

/// Outcome of loading one staged file.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub table: TargetTable,
    pub run_date: NaiveDate,
    pub rows_loaded: usize,
    /// Rows from an earlier load of the same run date that were removed first
    pub rows_replaced: usize,
}

/// Staging area plus target tables.
///
/// Implementations must make [`Warehouse::load_file`] all-or-nothing per file
/// and idempotent per run date: loading the same partition twice leaves the
/// tables as if it had been loaded once.
pub trait Warehouse: Send + Sync {
    /// Copies `local` into the staging area under `<run_date>/<file_name>`,
    /// replacing whatever was staged there before.
    fn stage_file(
        &self,
        local: &Path,
        table: TargetTable,
        run_date: NaiveDate,
        expected_rows: usize,
    ) -> impl Future<Output = Result<StagedFile, AppError>> + Send;

    /// Finds a file staged by an earlier run, for resuming at the load step.
    fn staged_file(
        &self,
        table: TargetTable,
        run_date: NaiveDate,
        expected_rows: usize,
    ) -> impl Future<Output = Result<StagedFile, AppError>> + Send;

    fn load_file(&self, staged: &StagedFile)
    -> impl Future<Output = Result<LoadReport, AppError>> + Send;

    fn row_count(&self, table: TargetTable) -> impl Future<Output = Result<u64, AppError>> + Send;
}
