use tracing::info;

use crate::error::AppError;
use crate::warehouse::{LoadReport, StagedFile, Warehouse};

/// Loads staged files in order. Each file is its own transaction; a failure
/// leaves earlier files of the run loaded and the failing one untouched.
pub async fn load<W: Warehouse>(warehouse: &W, staged: &[StagedFile]) -> Result<Vec<LoadReport>, AppError> {
    let mut reports = Vec::with_capacity(staged.len());
    for file in staged {
        let report = warehouse.load_file(file).await?;
        let total = warehouse.row_count(file.table).await?;
        info!(
            "{}: loaded {} rows for {} ({} rows in table)",
            report.table, report.rows_loaded, report.run_date, total
        );
        reports.push(report);
    }
    Ok(reports)
}
