use tracing::info;

use super::validate::ValidatedRun;
use crate::error::AppError;
use crate::warehouse::{StagedFile, Warehouse};

/// Uploads every validated file to the staging area under its run-date key.
pub async fn stage<W: Warehouse>(warehouse: &W, run: &ValidatedRun) -> Result<Vec<StagedFile>, AppError> {
    let run_date = run.partition.run_date();
    let mut staged = Vec::with_capacity(run.files.len());
    for file in &run.files {
        staged.push(
            warehouse
                .stage_file(&file.path, file.table, run_date, file.rows)
                .await?,
        );
    }
    info!("Staged {} file(s) for {}", staged.len(), run_date);
    Ok(staged)
}

/// Locates files an earlier run already staged.
pub async fn previously_staged<W: Warehouse>(
    warehouse: &W,
    run: &ValidatedRun,
) -> Result<Vec<StagedFile>, AppError> {
    let run_date = run.partition.run_date();
    let mut staged = Vec::with_capacity(run.files.len());
    for file in &run.files {
        staged.push(warehouse.staged_file(file.table, run_date, file.rows).await?);
    }
    Ok(staged)
}
