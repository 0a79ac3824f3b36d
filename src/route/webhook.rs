use std::path::Path;

use api::event::RecordingComplete;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use storage::Store;
use tracing::{error, info, warn};

use crate::result::Result;
use crate::route::AppState;

pub fn route() -> Router<AppState> {
    Router::new().route(api::path::RECORDING_COMPLETE_WEBHOOK, post(recording_complete))
}

/// Cleanup hook fired by the recording service once a broadcast has been
/// finalized. The finalizer reads only from the recordings bucket, so the
/// live segments are safe to erase here.
async fn recording_complete(
    State(state): State<AppState>,
    Json(req): Json<RecordingComplete>,
) -> Result<Json<api::response::Message>> {
    info!(
        stream_key = req.stream_key,
        success = req.success,
        "recording complete webhook received"
    );

    if !req.success {
        warn!(stream_key = req.stream_key, "recording failed, skipping cleanup");
        return Ok(Json(api::response::Message::new(
            "Recording failed, cleanup skipped",
        )));
    }

    // Both removals are best-effort; failures leave orphans, not corruption.
    let prefix = format!("live-segments/{}/", req.stream_key);
    match state.live_store.delete_prefix(&prefix).await {
        Ok(count) => info!(prefix, count, "deleted live segments"),
        Err(err) => error!(prefix, %err, "failed to delete live segments"),
    }

    let scratch = Path::new(&state.config.transcode.scratch_dir).join(&req.stream_key);
    match tokio::fs::remove_dir_all(&scratch).await {
        Ok(()) => info!(path = %scratch.display(), "deleted scratch directory"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => error!(path = %scratch.display(), %err, "failed to delete scratch directory"),
    }

    Ok(Json(api::response::Message::new("Cleanup completed")))
}
