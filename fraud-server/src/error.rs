//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use fraud_core::{PipelineError, StoreError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    // Auth errors
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token expired")]
    TokenExpired,
    #[error("token invalid")]
    TokenInvalid,
    #[error("authentication required")]
    Unauthorized,
    #[error("access denied")]
    Forbidden,

    // Resource errors
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),

    // Validation errors
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    PayloadTooLarge(String),

    // Rejected upload or pipeline failure
    #[error(transparent)]
    Pipeline(PipelineError),

    // Result store errors
    #[error(transparent)]
    Storage(StoreError),

    // Database errors
    #[error("database error: {0}")]
    DatabaseError(String),

    // Generic errors
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::TokenExpired
            | AppError::TokenInvalid
            | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Pipeline(err) => match err {
                PipelineError::Schema { .. } | PipelineError::DataFormat { .. } => {
                    StatusCode::BAD_REQUEST
                }
                PipelineError::Encoding { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::Storage(store) => store_status(store),
                PipelineError::Inference(_) | PipelineError::ArtifactLoad { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Storage(store) => store_status(store),
            AppError::DatabaseError(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    if matches!(err, StoreError::Busy(_) | StoreError::Exhausted { .. }) {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::InvalidCredentials => "Invalid facility name or password".to_string(),
            AppError::TokenExpired => "Token has expired".to_string(),
            AppError::TokenInvalid => "Invalid token".to_string(),
            AppError::Unauthorized => "Authentication required".to_string(),
            AppError::Forbidden => "Access denied".to_string(),
            AppError::NotFound(msg)
            | AppError::AlreadyExists(msg)
            | AppError::ValidationError(msg)
            | AppError::PayloadTooLarge(msg) => msg.clone(),
            // The uploader can fix these, so they see the full message
            AppError::Pipeline(err) if err.is_input_error() => err.to_string(),
            AppError::Pipeline(PipelineError::Storage(_)) | AppError::Storage(_)
                if status == StatusCode::SERVICE_UNAVAILABLE =>
            {
                tracing::warn!("Store unavailable: {}", self);
                "Database is busy, please try again shortly".to_string()
            }
            AppError::Pipeline(err) => {
                tracing::error!("Pipeline error: {}", err);
                "Prediction failed".to_string()
            }
            AppError::Storage(err) => {
                tracing::error!("Store error: {}", err);
                "Database error occurred".to_string()
            }
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                "Database error occurred".to_string()
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Storage(store) => AppError::Storage(store),
            other => AppError::Pipeline(other),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Storage(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::TokenInvalid,
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge(format!("Upload too large: {}", err.body_text()));
        }
        AppError::ValidationError(format!("Failed to read upload: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_are_client_errors() {
        let schema: AppError = PipelineError::Schema { missing: vec!["Diagnosis".into()] }.into();
        assert_eq!(schema.status(), StatusCode::BAD_REQUEST);

        let format: AppError = PipelineError::data_format("row 1: bad date").into();
        assert_eq!(format.status(), StatusCode::BAD_REQUEST);

        let encoding: AppError = PipelineError::encoding("Diagnosis", "Gout").into();
        assert_eq!(encoding.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_store_errors() {
        let exhausted: AppError = PipelineError::Storage(StoreError::Exhausted {
            attempts: 5,
            last: "locked".into(),
        })
        .into();
        assert!(matches!(exhausted, AppError::Storage(_)));
        assert_eq!(exhausted.status(), StatusCode::SERVICE_UNAVAILABLE);

        let permanent: AppError = StoreError::Permanent("bad row".into()).into();
        assert_eq!(permanent.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_payload_too_large() {
        let err = AppError::PayloadTooLarge("Upload too large".into());
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_inference_is_server_error() {
        let err: AppError = PipelineError::Inference("mismatch".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
