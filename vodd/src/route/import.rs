use auth::CurrentUser;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use db::status;
use http::StatusCode;
use storage::Store;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::result::Result;
use crate::route::AppState;

pub fn route() -> Router<AppState> {
    Router::new().route(api::path::VIDEOS_IMPORT_RECORDING, post(import_recording))
}

/// Promotes a completed recording into a durable video asset.
///
/// Idempotent on `recording_id`: a repeated import returns the existing
/// video. The MP4 and thumbnail move bucket-to-bucket via server-side copy,
/// so recording bytes never stream through this process. Orphan objects from
/// a crash between copy and insert are tolerated; deterministic naming plus
/// the unique index keep the row space consistent.
async fn import_recording(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<api::request::ImportRecording>,
) -> Result<(StatusCode, Json<api::response::ImportRecording>)> {
    if req.title.is_empty() {
        return Err(AppError::bad_request("title is required"));
    }
    let visibility = req
        .visibility
        .unwrap_or_else(|| status::visibility::PUBLIC.to_string());
    if ![
        status::visibility::PUBLIC,
        status::visibility::PRIVATE,
        status::visibility::UNLISTED,
    ]
    .contains(&visibility.as_str())
    {
        return Err(AppError::bad_request("invalid visibility"));
    }

    if let Some(existing) = state.videos.get_by_recording(req.recording_id).await? {
        info!(recording_id = %req.recording_id, video_id = %existing.id, "recording already imported");
        return Ok((
            StatusCode::OK,
            Json(api::response::ImportRecording {
                video_id: existing.id,
                message: "Recording already imported".to_string(),
            }),
        ));
    }

    let recording = state
        .recordings
        .get(req.recording_id)
        .await?
        .ok_or_else(|| AppError::resource_not_found("Recording not found"))?;
    if recording.status != status::recording::COMPLETED {
        return Err(AppError::bad_request(format!(
            "recording is not completed (status: {})",
            recording.status
        )));
    }

    let video_id = Uuid::new_v4();
    let video_file = format!("{video_id}.mp4");
    state
        .videos_store
        .copy_from(
            &state.config.buckets.recordings,
            &recording.file_path,
            &video_file,
            "video/mp4",
        )
        .await
        .map_err(|err| AppError::upstream(format!("failed to copy recording: {err}")))?;
    info!(recording_id = %req.recording_id, video_file, "video copied");

    let mut thumbnail_file = String::new();
    if let Some(thumbnail_path) = recording.thumbnail_path.as_deref().filter(|p| !p.is_empty()) {
        let dst = format!("{video_id}.jpg");
        match state
            .videos_store
            .copy_from(&state.config.buckets.recordings, thumbnail_path, &dst, "image/jpeg")
            .await
        {
            Ok(()) => thumbnail_file = dst,
            Err(err) => warn!(recording_id = %req.recording_id, %err, "thumbnail copy failed"),
        }
    }

    let now = Utc::now();
    let video = db::Video {
        id: video_id,
        user_id: user.id,
        recording_id: Some(req.recording_id),
        stream_id: Some(recording.stream_id),
        title: req.title,
        description: req.description,
        category: req.category,
        tags: req.tags,
        source: status::source::RECORDING.to_string(),
        status: status::video::READY.to_string(),
        visibility,
        file_path: video_file,
        thumbnail_path: thumbnail_file,
        duration: recording.duration,
        file_size: recording.file_size,
        view_count: 0,
        like_count: 0,
        created_at: recording.started_at,
        updated_at: now,
        published_at: None,
        username: None,
    };

    match state.videos.create(&video).await? {
        Some(created) => {
            if let Err(err) = state.recordings.set_video_id(req.recording_id, created.id).await {
                warn!(recording_id = %req.recording_id, %err, "failed to backlink video id");
            }
            info!(recording_id = %req.recording_id, video_id = %created.id, "recording imported");
            Ok((
                StatusCode::CREATED,
                Json(api::response::ImportRecording {
                    video_id: created.id,
                    message: "Recording imported successfully".to_string(),
                }),
            ))
        }
        // A concurrent import won the insert race; answer with its video.
        None => {
            let existing = state
                .videos
                .get_by_recording(req.recording_id)
                .await?
                .ok_or_else(|| {
                    AppError::InternalServerError(anyhow::anyhow!(
                        "import race lost but no existing video found"
                    ))
                })?;
            Ok((
                StatusCode::OK,
                Json(api::response::ImportRecording {
                    video_id: existing.id,
                    message: "Recording already imported".to_string(),
                }),
            ))
        }
    }
}
