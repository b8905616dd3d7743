//! Upload handler - one CSV in, one stored batch out

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use fraud_core::{RecordTable, UploadOutcome};

use crate::middleware::auth::FacilityContext;
use crate::{AppError, AppResult, AppState};

const FILE_FIELD: &str = "file";

/// Classify and store an uploaded CSV of patient encounters
pub async fn create(
    State(state): State<AppState>,
    ctx: FacilityContext,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadOutcome>)> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            let filename = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?;
            tracing::info!(
                "Upload from {}: {:?} ({} bytes)",
                ctx.facility_id, filename, bytes.len()
            );
            upload = Some(bytes);
            break;
        }
    }

    let bytes = upload.ok_or_else(|| {
        AppError::ValidationError(format!("Missing multipart field '{}'", FILE_FIELD))
    })?;

    let table = RecordTable::from_csv_bytes(&bytes)?;
    let outcome = state
        .pipeline
        .process_upload(ctx.facility_id, &table, state.store.as_ref())
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}
