//! Authentication and account handlers

use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::middleware::auth::FacilityContext;
use crate::models::{hash_password, ChangePasswordRequest, Credentials, Facility, FacilityInfo, LoginResponse};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // Facility ID
    pub adm: bool,        // Admin flag
    pub exp: usize,       // Expiration timestamp
    pub iat: usize,       // Issued at
}

/// Register a new facility
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> AppResult<(StatusCode, Json<FacilityInfo>)> {
    req.validate()?;
    let name = req.name.trim();

    if Facility::find_by_name(&state.pool, name).await?.is_some() {
        return Err(AppError::AlreadyExists(
            "Facility name already exists. Please choose a different name.".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let facility = Facility::create(&state.pool, name, &password_hash, false).await?;

    tracing::info!("New facility registered: {} ({})", facility.name, facility.id);

    Ok((StatusCode::CREATED, Json(facility.to_info())))
}

/// Login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> AppResult<Json<LoginResponse>> {
    req.validate()?;

    let facility = Facility::find_by_name(&state.pool, req.name.trim())
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !facility.verify_password(&req.password)? {
        tracing::warn!("Failed login for facility {}", facility.id);
        return Err(AppError::InvalidCredentials);
    }

    let token = generate_jwt(&facility, &state.config.jwt_secret, state.config.jwt_expiration_hours)?;

    Ok(Json(LoginResponse {
        token,
        facility: facility.to_info(),
    }))
}

/// Current facility profile
pub async fn account(
    State(state): State<AppState>,
    ctx: FacilityContext,
) -> AppResult<Json<FacilityInfo>> {
    let facility = Facility::find_by_id(&state.pool, ctx.facility_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Facility not found".to_string()))?;

    Ok(Json(facility.to_info()))
}

/// Change own password
pub async fn change_password(
    State(state): State<AppState>,
    ctx: FacilityContext,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    req.validate()?;

    let facility = Facility::find_by_id(&state.pool, ctx.facility_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Facility not found".to_string()))?;

    if !facility.verify_password(&req.old_password)? {
        return Err(AppError::ValidationError("Old password is incorrect".to_string()));
    }

    let password_hash = hash_password(&req.new_password)?;
    Facility::update_password(&state.pool, facility.id, &password_hash).await?;

    tracing::info!("Password updated for facility {}", facility.id);

    Ok(Json(serde_json::json!({ "updated": true })))
}

/// Generate JWT token
pub fn generate_jwt(facility: &Facility, secret: &str, expiration_hours: u64) -> AppResult<String> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiration_hours as i64);

    let claims = Claims {
        sub: facility.id.to_string(),
        adm: facility.is_admin,
        exp: exp.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes())
    ).map_err(|e| AppError::InternalError(e.to_string()))
}
