use std::path::PathBuf;
use tracing::{debug, info};

use super::partition::{RunManifest, RunPartition};
use crate::config::Config;
use crate::error::AppError;
use crate::warehouse::TargetTable;

/// A local file that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFile {
    pub table: TargetTable,
    pub path: PathBuf,
    pub rows: usize,
}

/// Extractor output that is safe to stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRun {
    pub partition: RunPartition,
    pub manifest: RunManifest,
    pub files: Vec<ValidatedFile>,
}

impl ValidatedRun {
    /// Takes the manifest at its word, for resuming past the validate step.
    pub fn from_manifest(partition: &RunPartition, manifest: RunManifest) -> Self {
        let files = TargetTable::ALL
            .iter()
            .map(|&table| ValidatedFile {
                table,
                path: partition.file_path(table),
                rows: manifest.rows(table),
            })
            .collect();
        ValidatedRun {
            partition: partition.clone(),
            manifest,
            files,
        }
    }
}

/// Checks the extractor's output against its manifest.
///
/// Every file must exist, start with exactly its header row and hold as many
/// data rows as the manifest says. An empty game file is only accepted when
/// the run is flagged off-season; the player file may be empty.
pub async fn validate(
    config: &Config,
    partition: &RunPartition,
    manifest: &RunManifest,
) -> Result<ValidatedRun, AppError> {
    let manifest_path = partition.manifest_path().display().to_string();

    if manifest.run_date != partition.run_date() {
        return Err(AppError::extraction_incomplete(
            manifest_path,
            format!(
                "manifest is for {}, expected {}",
                manifest.run_date,
                partition.run_date()
            ),
        ));
    }
    if manifest.team_id != config.team_id || manifest.season != config.season {
        return Err(AppError::extraction_incomplete(
            manifest_path,
            format!(
                "manifest covers team {} season {}, run is for team {} season {}",
                manifest.team_id, manifest.season, config.team_id, config.season
            ),
        ));
    }

    let off_season = manifest.off_season || config.off_season;
    let mut files = Vec::with_capacity(TargetTable::ALL.len());

    for table in TargetTable::ALL {
        let path = partition.file_path(table);
        let shown = path.display().to_string();

        let expected = manifest
            .file(table)
            .ok_or_else(|| {
                AppError::extraction_incomplete(&manifest_path, format!("no entry for {}", table.file_name()))
            })?
            .rows;

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AppError::extraction_incomplete(shown, "file is missing"));
        }

        let rows = count_data_rows(&path, table).await?;
        if rows != expected {
            return Err(AppError::extraction_incomplete(
                shown,
                format!("{rows} data rows, manifest says {expected}"),
            ));
        }
        if table == TargetTable::Games && rows == 0 && !off_season {
            return Err(AppError::extraction_incomplete(
                shown,
                "no games extracted for an in-progress season (pass --off-season if that is expected)",
            ));
        }

        debug!("{} passed validation with {} rows", shown, rows);
        files.push(ValidatedFile { table, path, rows });
    }

    info!(
        "Validated {} for {}: {} games, {} player rows",
        partition.dir().display(),
        partition.run_date(),
        manifest.rows(TargetTable::Games),
        manifest.rows(TargetTable::PlayerStats)
    );

    Ok(ValidatedRun {
        partition: partition.clone(),
        manifest: manifest.clone(),
        files,
    })
}

/// Header must match exactly; returns the number of records after it.
async fn count_data_rows(path: &std::path::Path, table: TargetTable) -> Result<usize, AppError> {
    let shown = path.display().to_string();
    let content = tokio::fs::read(path).await?;
    if content.is_empty() {
        return Err(AppError::extraction_incomplete(shown, "file is empty"));
    }

    let mut reader = csv::Reader::from_reader(content.as_slice());
    let headers = reader
        .headers()
        .map_err(|e| AppError::extraction_incomplete(&shown, format!("unreadable header: {e}")))?
        .clone();
    if !headers.iter().eq(table.header().iter().copied()) {
        return Err(AppError::extraction_incomplete(
            shown,
            format!(
                "unexpected header [{}], expected [{}]",
                headers.iter().collect::<Vec<_>>().join(","),
                table.header().join(",")
            ),
        ));
    }

    let mut rows = 0usize;
    for record in reader.records() {
        record.map_err(|e| AppError::extraction_incomplete(&shown, format!("unreadable row: {e}")))?;
        rows += 1;
    }
    Ok(rows)
}
