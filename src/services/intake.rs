use bytes::Bytes;
use std::sync::Arc;
use tokio::time::timeout;

use crate::api::error::AppError;
use crate::config::ProcessingConfig;
use crate::models::UploadItem;
use crate::services::storage::{ReleaseGuard, StorageArea};
use crate::utils::validation::{sanitize_filename, validate_item};

/// Validates a batch of (payload, tag) pairs and persists the accepted files
/// into the storage area, in input order.
///
/// Validation short-circuits on the first failure. Every allocated path is
/// pushed onto the caller's [`ReleaseGuard`] before its copy, so a failure at
/// item *k* rolls back items *0..k-1* (and any partial write of *k*) when the
/// guard unwinds: the whole batch persists or none of it does. A copy that
/// outlives its timeout is awaited by a follow-up task that deletes the file
/// it produced, so it cannot reappear after the guard has released the path.
pub async fn validate_and_store(
    area: &Arc<StorageArea>,
    config: &ProcessingConfig,
    payloads: Vec<(String, Bytes)>,
    tags: Vec<String>,
    guard: &mut ReleaseGuard,
) -> Result<Vec<UploadItem>, AppError> {
    if payloads.is_empty() {
        return Err(AppError::InvalidRequest("No files uploaded.".to_string()));
    }

    if payloads.len() != tags.len() {
        return Err(AppError::InvalidRequest(
            "Number of files and tags must match.".to_string(),
        ));
    }

    let mut items = Vec::with_capacity(payloads.len());

    for ((filename, data), raw_tag) in payloads.into_iter().zip(tags) {
        let tag = validate_item(&filename, &raw_tag)
            .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

        let stored_path = area.allocate(&sanitize_filename(&filename));
        // Registered before the copy so even a partial write gets unwound
        guard.push(stored_path.clone());

        let copy_path = stored_path.clone();
        let mut job = tokio::task::spawn_blocking(move || std::fs::write(&copy_path, &data));

        match timeout(config.copy_timeout, &mut job).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => {
                return Err(AppError::Internal(format!(
                    "Failed to save {}: {}",
                    filename, e
                )));
            }
            Ok(Err(join_err)) => {
                return Err(AppError::Internal(format!(
                    "Copy task failed for {}: {}",
                    filename, join_err
                )));
            }
            Err(_) => {
                let area = area.clone();
                let stale = stored_path;
                tokio::spawn(async move {
                    let _ = job.await;
                    area.release(&stale);
                });
                return Err(AppError::ProcessingFailure(format!(
                    "Timed out saving {}",
                    filename
                )));
            }
        }

        tracing::debug!(
            "Stored {} as {} (tag {})",
            filename,
            stored_path.display(),
            tag
        );

        items.push(UploadItem {
            original_filename: filename,
            tag,
            stored_path,
        });
    }

    Ok(items)
}
