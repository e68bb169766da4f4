use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::timeout;
use uuid::Uuid;

use crate::api::error::AppError;
use crate::config::ProcessingConfig;
use crate::models::{CellScalar, CombinedTable, PeriodContext};
use crate::services::storage::{ReleaseGuard, StorageArea};

/// MIME type of the generated report.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Serializes the combined table to an `.xlsx` file inside the storage area.
///
/// The filename embeds the period and a fresh uuid so concurrent requests
/// never collide. The path is registered with the release guard before the
/// write starts, so a failed or partial output is unwound with the rest of
/// the request. Serialization runs on the blocking pool under the configured
/// timeout; timeout or write failure is `MaterializationFailure`. On timeout
/// the blocking task may still be writing, so a follow-up task waits for it
/// to finish and deletes whatever it produced.
pub async fn materialize(
    combined: CombinedTable,
    ctx: &PeriodContext,
    area: &Arc<StorageArea>,
    config: &ProcessingConfig,
    guard: &mut ReleaseGuard,
) -> Result<PathBuf, AppError> {
    let filename = format!(
        "report_{}_{}_{}.xlsx",
        ctx.year,
        ctx.quarter.as_str(),
        Uuid::new_v4()
    );
    let path = area.root().join(filename);
    guard.push(path.clone());

    let out_path = path.clone();
    let mut job = tokio::task::spawn_blocking(move || write_workbook(&combined, &out_path));

    match timeout(config.serialize_timeout, &mut job).await {
        Ok(Ok(Ok(()))) => Ok(path),
        Ok(Ok(Err(e))) => Err(AppError::MaterializationFailure(format!(
            "Failed to write output spreadsheet: {}",
            e
        ))),
        Ok(Err(join_err)) => Err(AppError::MaterializationFailure(format!(
            "Serialization task failed: {}",
            join_err
        ))),
        Err(_) => {
            let area = area.clone();
            let stale = path;
            tokio::spawn(async move {
                let _ = job.await;
                area.release(&stale);
            });
            Err(AppError::MaterializationFailure(
                "Timed out serializing output spreadsheet".to_string(),
            ))
        }
    }
}

/// Header row = union columns, then data rows, insertion order preserved.
/// `Empty` cells are left blank in the sheet.
fn write_workbook(
    combined: &CombinedTable,
    path: &Path,
) -> Result<(), rust_xlsxwriter::XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, name) in combined.columns.iter().enumerate() {
        sheet.write_string(0, col as u16, name.as_str())?;
    }

    for (r, row) in combined.rows.iter().enumerate() {
        let excel_row = (r + 1) as u32;
        for (c, value) in row.iter().enumerate() {
            match value {
                CellScalar::Text(s) => {
                    sheet.write_string(excel_row, c as u16, s.as_str())?;
                }
                CellScalar::Number(n) => {
                    sheet.write_number(excel_row, c as u16, *n)?;
                }
                CellScalar::Empty => {}
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}
