//! Bearer-token authentication
//!
//! `require_facility_auth` decodes the JWT and stores a `FacilityContext`
//! in the request extensions; handlers take it as an extractor.
//! Admin routes additionally run `require_admin_auth`.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, DecodingKey, Validation};
use uuid::Uuid;

use crate::handlers::auth::Claims;
use crate::{AppError, AppState};

/// The authenticated facility behind a request
#[derive(Debug, Clone)]
pub struct FacilityContext {
    pub facility_id: Uuid,
    pub is_admin: bool,
}

impl FacilityContext {
    fn from_claims(claims: Claims) -> Result<Self, AppError> {
        let facility_id = claims.sub.parse::<Uuid>().map_err(|_| AppError::TokenInvalid)?;
        Ok(FacilityContext {
            facility_id,
            is_admin: claims.adm,
        })
    }
}

pub fn require_admin(facility: &FacilityContext) -> Result<(), AppError> {
    if facility.is_admin {
        return Ok(());
    }
    tracing::warn!("Facility {} denied an admin route", facility.facility_id);
    Err(AppError::Forbidden)
}

pub async fn require_facility_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = {
        let token = bearer_token(req.headers()).ok_or(AppError::Unauthorized)?;
        let key = DecodingKey::from_secret(state.config.jwt_secret.as_bytes());
        decode::<Claims>(token, &key, &Validation::default())?.claims
    };

    let ctx = FacilityContext::from_claims(claims)?;
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

pub async fn require_admin_auth(req: Request, next: Next) -> Result<Response, AppError> {
    match req.extensions().get::<FacilityContext>() {
        Some(ctx) => require_admin(ctx)?,
        None => return Err(AppError::Unauthorized),
    }
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for FacilityContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<FacilityContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
