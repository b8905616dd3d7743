//! Model info handler

use axum::{extract::State, Json};
use fraud_core::ModelInfo;

use crate::AppState;

pub async fn info(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(state.pipeline.model_info())
}
