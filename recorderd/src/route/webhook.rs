use api::event::{StreamEvent, StreamEventKind};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info};

use crate::result::Result;
use crate::route::AppState;

pub fn route() -> Router<AppState> {
    Router::new().route(api::path::STREAM_EVENT_WEBHOOK, post(stream_event))
}

/// Lifecycle webhook from the ingest service.
async fn stream_event(
    State(state): State<AppState>,
    Json(payload): Json<StreamEvent>,
) -> Result<Json<serde_json::Value>> {
    info!(
        stream_key = payload.stream_key,
        event = ?payload.event,
        "stream event webhook received"
    );

    match payload.event {
        StreamEventKind::Started => {
            if let Err(err) = state.monitor.handle_started(&payload.stream_key).await {
                error!(stream_key = payload.stream_key, %err, "failed to start recording");
                return Err(err.into());
            }
        }
        StreamEventKind::Stopped => {
            state.monitor.handle_stopped(&payload.stream_key).await;
        }
    }

    Ok(Json(json!({ "status": "ok" })))
}
