use axum::{
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::AppState;
use crate::api::error::AppError;
use crate::models::{PeriodContext, Quarter};
use crate::services::storage::ReleaseGuard;
use crate::services::{aggregate, intake, materialize, transform};

/// Raw multipart fields of one batch request, in arrival order.
struct BatchForm {
    payloads: Vec<(String, Bytes)>,
    tags: Vec<String>,
    year: Option<String>,
    quarter: Option<String>,
}

/// Handles one processing batch: validate and store the uploads, run each
/// file's transformer under the period context, union-merge the outputs, and
/// return the combined spreadsheet. Every stored file, the generated output
/// included, is released before the response leaves, whichever stage failed.
#[utoipa::path(
    post,
    path = "/process",
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "Repeated `files` parts with parallel `tags` text parts, plus `year` and `quarter`"
    ),
    responses(
        (status = 200, description = "Combined spreadsheet", body = Vec<u8>, content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 400, description = "Invalid batch, tag, extension, pairing, or period"),
        (status = 422, description = "No file produced any rows"),
        (status = 500, description = "A file failed to process or the output could not be written")
    ),
    tag = "processing"
)]
pub async fn process_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = collect_form(multipart).await?;
    let ctx = parse_period(&form)?;

    // Single unwind point for every path allocated during this request
    let mut guard = ReleaseGuard::new(state.storage.clone());

    let result = run_pipeline(&state, form, ctx, &mut guard).await;
    match &result {
        Ok(_) => tracing::info!("Batch processed for {} {}", ctx.year, ctx.quarter),
        Err(e) => tracing::warn!("Batch failed for {} {}: {}", ctx.year, ctx.quarter, e),
    }
    result
}

async fn run_pipeline(
    state: &AppState,
    form: BatchForm,
    ctx: PeriodContext,
    guard: &mut ReleaseGuard,
) -> Result<Response, AppError> {
    let items = intake::validate_and_store(
        &state.storage,
        &state.config,
        form.payloads,
        form.tags,
        guard,
    )
    .await?;

    // Sequential, in input order: output row order must match file order
    let mut tables = Vec::with_capacity(items.len());
    for item in &items {
        tables.push(transform::dispatch(item, &ctx, &state.config).await?);
    }

    let combined = aggregate::aggregate(tables)?;
    if combined.rows.is_empty() {
        return Err(AppError::EmptyResult);
    }

    let out_path =
        materialize::materialize(combined, &ctx, &state.storage, &state.config, guard).await?;

    let output_name = out_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("report.xlsx")
        .to_string();

    // Buffer the report so the on-disk copy can be released with everything
    // else once the guard drops
    let body = tokio::fs::read(&out_path).await?;

    let headers = [
        (
            header::CONTENT_TYPE,
            materialize::XLSX_CONTENT_TYPE.to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", output_name),
        ),
    ];

    Ok((headers, body).into_response())
}

async fn collect_form(mut multipart: Multipart) -> Result<BatchForm, AppError> {
    let mut form = BatchForm {
        payloads: Vec::new(),
        tags: Vec::new(),
        year: None,
        quarter: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
                form.payloads.push((filename, data));
            }
            "tags" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
                form.tags.push(text);
            }
            "year" => {
                form.year = Some(field.text().await.unwrap_or_default());
            }
            "quarter" => {
                form.quarter = Some(field.text().await.unwrap_or_default());
            }
            other => {
                tracing::debug!("Ignoring unknown multipart field '{}'", other);
            }
        }
    }

    Ok(form)
}

/// Period validation is independent of file validation but always precedes
/// transformation.
fn parse_period(form: &BatchForm) -> Result<PeriodContext, AppError> {
    let year: i32 = form
        .year
        .as_deref()
        .ok_or_else(|| AppError::InvalidRequest("Missing 'year' field.".to_string()))?
        .trim()
        .parse()
        .map_err(|_| AppError::InvalidRequest("Year must be an integer.".to_string()))?;

    let quarter = form
        .quarter
        .as_deref()
        .ok_or_else(|| AppError::InvalidRequest("Missing 'quarter' field.".to_string()))
        .and_then(|q| {
            Quarter::parse(q.trim()).ok_or_else(|| {
                AppError::InvalidRequest(format!(
                    "Invalid quarter '{}'. Allowed: Q1, Q2, Q3, Q4.",
                    q
                ))
            })
        })?;

    PeriodContext::new(year, quarter).map_err(AppError::InvalidRequest)
}
