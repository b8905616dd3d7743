//! Batch history handlers - a facility's own uploads

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use fraud_core::aggregate::label_breakdown;
use fraud_core::{BatchId, BatchMeta, LabelCount, RecordTable, Summary};
use serde::Serialize;

use crate::middleware::auth::FacilityContext;
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct BatchDetail {
    pub batch: BatchMeta,
    pub summary: Option<Summary>,
    pub breakdown: Vec<LabelCount>,
    pub table: RecordTable,
}

/// List own batches, newest first
pub async fn list(
    State(state): State<AppState>,
    ctx: FacilityContext,
) -> AppResult<Json<Vec<BatchMeta>>> {
    let batches = state.store.list_batches(ctx.facility_id).await?;
    Ok(Json(batches))
}

pub async fn summary(
    State(state): State<AppState>,
    ctx: FacilityContext,
    Path(id): Path<BatchId>,
) -> AppResult<Json<Summary>> {
    authorize(&state, &ctx, id).await?;

    let summary = state
        .store
        .get_summary(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Summary not found".to_string()))?;

    Ok(Json(summary))
}

/// Labeled rows with a per-label breakdown
pub async fn detail(
    State(state): State<AppState>,
    ctx: FacilityContext,
    Path(id): Path<BatchId>,
) -> AppResult<Json<BatchDetail>> {
    let batch = authorize(&state, &ctx, id).await?;
    let table = prediction_table(&state, id).await?;
    let summary = state.store.get_summary(id).await?;

    Ok(Json(BatchDetail {
        batch,
        summary,
        breakdown: label_breakdown(&table),
        table,
    }))
}

/// Labeled rows as CSV
pub async fn download(
    State(state): State<AppState>,
    ctx: FacilityContext,
    Path(id): Path<BatchId>,
) -> AppResult<impl IntoResponse> {
    authorize(&state, &ctx, id).await?;
    let table = prediction_table(&state, id).await?;

    let csv = table
        .to_csv_bytes()
        .map_err(|e| AppError::InternalError(format!("CSV encoding failed: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"predictions_{}.csv\"", id),
            ),
        ],
        csv,
    ))
}

/// Batch metadata, if the caller owns the batch or is an admin
async fn authorize(state: &AppState, ctx: &FacilityContext, id: BatchId) -> AppResult<BatchMeta> {
    let batch = state
        .store
        .get_batch(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch not found".to_string()))?;

    // Verify facility ownership
    if batch.owner_id != ctx.facility_id && !ctx.is_admin {
        return Err(AppError::Forbidden);
    }

    Ok(batch)
}

async fn prediction_table(state: &AppState, id: BatchId) -> AppResult<RecordTable> {
    state
        .store
        .get_detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch not found".to_string()))
}
