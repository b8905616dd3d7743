//! Admin handlers - cross-facility views and maintenance
//!
//! Mounted behind `require_admin_auth`.

use axum::{extract::State, http::StatusCode, Json};
use fraud_core::aggregate::{fraud_cases as collect_fraud_cases, national_report};
use fraud_core::{NationalReport, RecordTable, Summary};
use serde::Serialize;
use validator::Validate;

use crate::middleware::auth::FacilityContext;
use crate::models::{hash_password, Credentials, Facility, FacilityInfo, FacilityOverview};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct NationalOverview {
    pub facility_count: usize,
    #[serde(flatten)]
    pub report: NationalReport,
    /// Sum of stored per-batch summaries; matches `summary` unless data is inconsistent
    pub stored_summary: Summary,
}

#[derive(Debug, Serialize)]
pub struct FraudCases {
    pub total: usize,
    pub table: RecordTable,
}

pub async fn list_facilities(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<FacilityOverview>>> {
    let facilities = Facility::list_with_counts(&state.pool).await?;
    Ok(Json(facilities))
}

/// Create another admin account
pub async fn create_admin(
    State(state): State<AppState>,
    ctx: FacilityContext,
    Json(req): Json<Credentials>,
) -> AppResult<(StatusCode, Json<FacilityInfo>)> {
    req.validate()?;
    let name = req.name.trim();

    if Facility::find_by_name(&state.pool, name).await?.is_some() {
        return Err(AppError::AlreadyExists("Facility name already exists".to_string()));
    }

    let password_hash = hash_password(&req.password)?;
    let admin = Facility::create(&state.pool, name, &password_hash, true).await?;

    tracing::info!("Admin {} created by {}", admin.id, ctx.facility_id);

    Ok((StatusCode::CREATED, Json(admin.to_info())))
}

/// Predictions from every facility, aggregated
pub async fn national(State(state): State<AppState>) -> AppResult<Json<NationalOverview>> {
    let batches = state.store.list_all_batches().await?;

    let mut tables = Vec::with_capacity(batches.len());
    let mut summaries = Vec::with_capacity(batches.len());
    for batch in &batches {
        if let Some(table) = state.store.get_detail(batch.batch_id).await? {
            tables.push(table);
        }
        if let Some(summary) = state.store.get_summary(batch.batch_id).await? {
            summaries.push(summary);
        }
    }

    let mut owners: Vec<_> = batches.iter().map(|b| b.owner_id).collect();
    owners.sort();
    owners.dedup();

    let report = national_report(&tables);
    let stored_summary = Summary::combine(summaries);
    if stored_summary != report.summary {
        tracing::warn!(
            "Stored summaries ({:?}) disagree with recomputed totals ({:?})",
            stored_summary, report.summary
        );
    }

    Ok(Json(NationalOverview {
        facility_count: owners.len(),
        report,
        stored_summary,
    }))
}

/// Every row flagged as fraud, across all facilities
pub async fn fraud_cases(State(state): State<AppState>) -> AppResult<Json<FraudCases>> {
    let batches = state.store.list_all_batches().await?;

    let mut tables = Vec::with_capacity(batches.len());
    for batch in &batches {
        if let Some(table) = state.store.get_detail(batch.batch_id).await? {
            tables.push(table);
        }
    }

    let table = collect_fraud_cases(&tables);
    Ok(Json(FraudCases {
        total: table.len(),
        table,
    }))
}

/// Delete every batch and summary
pub async fn delete_data(
    State(state): State<AppState>,
    ctx: FacilityContext,
) -> AppResult<Json<serde_json::Value>> {
    let deleted = state.store.delete_all().await?;
    tracing::warn!("All batch data deleted by admin {} ({} batches)", ctx.facility_id, deleted);

    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
