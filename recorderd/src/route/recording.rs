use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::result::Result;
use crate::route::AppState;

pub fn route() -> Router<AppState> {
    Router::new()
        .route("/recordings", get(index))
        .route("/recording/{id}", get(show))
}

async fn index(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let recordings = state.recordings.list().await?;
    Ok(Json(json!({ "recordings": recordings, "total": recordings.len() })))
}

async fn show(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<serde_json::Value>> {
    match state.recordings.get(id).await? {
        Some(recording) => Ok(Json(json!({ "recording": recording }))),
        None => Err(AppError::resource_not_found("Recording not found")),
    }
}
